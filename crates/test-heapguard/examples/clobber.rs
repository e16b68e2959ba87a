use std::slice;

fn main() {
    let block = heapguard::allocate(8);
    let bytes = unsafe { slice::from_raw_parts(block.as_ptr(), 8) };

    let hex: Vec<String> = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    println!("fresh: {}", hex.join(" "));

    unsafe { heapguard::deallocate(block) };
}
