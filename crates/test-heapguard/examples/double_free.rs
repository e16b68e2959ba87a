use std::ptr::NonNull;

fn main() {
    let block = heapguard::allocate(32);
    unsafe {
        heapguard::deallocate(block);
        heapguard::deallocate(block);
    }

    let mut on_stack = [0u8; 8];
    let foreign = NonNull::from(&mut on_stack).cast::<u8>();
    let returned = unsafe { heapguard::reallocate(foreign, 64) };
    assert_eq!(returned, foreign);

    println!("still running");
}
