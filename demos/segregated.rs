use std::{io::Read, ptr};

use segalloc::{HeapStats, SegregatedAllocator, Sbrk};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how the program break moves.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    Sbrk::program_break(),
  );
}

fn print_alloc(
  allocator: &SegregatedAllocator<Sbrk>,
  size: usize,
  addr: *mut u8,
) {
  println!(
    "Allocated {} bytes ({} usable), address = {:?}, program break = {:?}",
    size,
    if addr.is_null() { 0 } else { unsafe { allocator.usable_size(addr) } },
    addr,
    Sbrk::program_break(),
  );
}

fn print_heap(allocator: &SegregatedAllocator<Sbrk>) {
  for block in allocator.blocks() {
    println!(
      "    {:#014x}  {:>6} bytes  {}",
      block.addr,
      block.size,
      if block.allocated { "allocated" } else { "free" }
    );
  }

  match allocator.check_heap() {
    Ok(HeapStats {
      heap_size,
      free_blocks,
      free_bytes,
      ..
    }) => println!("    heap = {heap_size} bytes, {free_blocks} free blocks holding {free_bytes} bytes"),
    Err(err) => println!("    heap check failed: {err}"),
  }
}

fn main() {
  // The allocator owns the program break from here on: it grows the heap
  // in 4 KiB chunks and never gives memory back.
  let mut allocator = SegregatedAllocator::new(Sbrk::new());

  print_program_break("start");
  if let Err(err) = allocator.init() {
    eprintln!("could not initialize the heap: {err}");
    return;
  }
  print_program_break("after init");
  print_heap(&allocator);
  block_until_enter_pressed();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Two small allocations carved from the first chunk.
    // --------------------------------------------------------------------
    let first = allocator.allocate(100);
    println!("\n[1] Allocate 100 bytes");
    print_alloc(&allocator, 100, first);
    first.cast::<u32>().write(0xDEADBEEF);

    let second = allocator.allocate(200);
    println!("[1] Allocate 200 bytes");
    print_alloc(&allocator, 200, second);
    ptr::write_bytes(second, 0xAB, 200);
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Free the first block. Its neighbours are the prologue and an
    //    allocated block, so it stays a free block of its own.
    // --------------------------------------------------------------------
    allocator.free(first);
    println!("\n[2] Freed first block at {:?}", first);
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) A smaller request lands in the hole left by the first block.
    // --------------------------------------------------------------------
    let third = allocator.allocate(50);
    println!("\n[3] Allocate 50 bytes (check reuse of freed block)");
    print_alloc(&allocator, 50, third);
    println!(
      "[3] third == first? {}",
      if third == first {
        "Yes, it reused the freed block"
      } else {
        "No, it allocated somewhere else"
      }
    );
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Grow the second block. Resize always moves: the contents are
    //    copied and the old block is freed and merged with its neighbours.
    // --------------------------------------------------------------------
    let grown = allocator.resize(second, 1000);
    println!("\n[4] Resize second block to 1000 bytes");
    print_alloc(&allocator, 1000, grown);
    println!("[4] First byte still 0x{:X}", grown.read());
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) A request larger than a chunk grows the heap by exactly what it
    //    needs, merged with the free space already at the end.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big = allocator.allocate(64 * 1024);
    println!("\n[5] Allocate 64 KiB");
    print_alloc(&allocator, 64 * 1024, big);
    print_program_break("after large alloc");
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Free everything. The heap collapses back into one free block, but
    //    the program break does not move back down.
    // --------------------------------------------------------------------
    allocator.free(third);
    allocator.free(grown);
    allocator.free(big);
    println!("\n[6] Freed everything");
    print_heap(&allocator);
    print_program_break("end");
  }

  println!("\nEnd of example. Process will exit and the OS will reclaim all memory.");
}
