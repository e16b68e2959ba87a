use std::ptr::NonNull;

fn main() {
    let family = std::env::args().nth(1).unwrap_or_default();

    let block: NonNull<u8> = match family.as_str() {
        "zeroed" => heapguard::allocate_zeroed(usize::MAX, 2),
        "reallocate" => {
            let block = heapguard::allocate(16);
            unsafe { heapguard::reallocate(block, isize::MAX as usize) }
        }
        _ => heapguard::allocate(isize::MAX as usize),
    };

    println!("unreachable: got {:p}", block);
}
