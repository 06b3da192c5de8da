//! Walks the block chain while allocating and releasing, printing the
//! metadata line of every block. Handy next to `pmap` or `gdb` when you
//! want to watch the segment evolve.

use brkalloc::Heap;

fn dump(label: &str, heap: &Heap) {
    println!("{label}:");

    for (i, view) in heap.blocks().enumerate() {
        println!("  {i}: {view}");
    }

    println!();
}

fn main() {
    let mut heap = Heap::new();

    unsafe {
        // Two small integer arrays, like a program would actually do.
        let n1 = 4;
        let ptr1 = heap.allocate(n1 * size_of::<i32>()).unwrap().cast::<i32>();
        let n2 = 3;
        let ptr2 = heap.allocate(n2 * size_of::<i32>()).unwrap().cast::<i32>();

        for i in 0..n1 {
            ptr1.add(i).write((i as i32 + 1) * 1111);
        }
        for i in 0..n2 {
            ptr2.add(i).write((i as i32 + 4) * 1001);
        }

        println!("ptr1 data:");
        for i in 0..n1 {
            println!("  ptr1[{i}] = {:6} [{:p}]", ptr1.add(i).read(), ptr1.add(i));
        }
        println!("ptr2 data:");
        for i in 0..n2 {
            println!("  ptr2[{i}] = {:6} [{:p}]", ptr2.add(i).read(), ptr2.add(i));
        }
        println!();

        dump("Chain after both allocations", &heap);

        heap.release(ptr1.cast().as_ptr());
        dump("Chain after releasing ptr1", &heap);

        // Small enough to reuse the released block, large enough to show
        // that its size does not shrink.
        let ptr3 = heap.allocate(8).unwrap();
        println!("allocate(8) returned {:p}", ptr3.as_ptr());
        println!("describe: {}", heap.describe(ptr3));
        println!();

        dump("Chain after the reuse", &heap);

        heap.release(ptr3.as_ptr());
        heap.release(ptr2.cast().as_ptr());
    }
}
