use std::ptr::NonNull;

use brkalloc::Heap;

fn log_alloc(addr: NonNull<u8>, requested: usize) {
    println!("Requested {requested} bytes of memory");
    println!("Received this address: {:p}", addr.as_ptr());
}

fn main() {
    let mut heap = Heap::new();

    unsafe {
        let addr1 = heap.allocate(size_of::<u64>()).unwrap();
        log_alloc(addr1, size_of::<u64>());

        // Prove the memory is usable.
        let value = addr1.cast::<u64>();
        value.write(0xDEADBEEF);
        println!("Value written and read back: 0x{:X}", value.read());

        let addr2 = heap.allocate(12).unwrap();
        log_alloc(addr2, 12);

        let addr3 = heap.allocate(16).unwrap();
        log_alloc(addr3, 16);

        heap.release(addr1.as_ptr());
        println!("\nReleased the first block, asking for 2 bytes again...");

        // First fit: the released 8 byte block at the head of the chain
        // is the first one that fits a 2 byte request.
        let addr4 = heap.allocate(2).unwrap();
        log_alloc(addr4, 2);

        if addr4 == addr1 {
            println!("The released block was reused");
        } else {
            println!("A new block was carved instead");
        }

        heap.release(addr2.as_ptr());
        heap.release(addr3.as_ptr());
        heap.release(addr4.as_ptr());
    }
}
