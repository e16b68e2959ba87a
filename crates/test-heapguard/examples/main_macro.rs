struct Buffer {
    len: usize,
}

#[heapguard::main(format = "json", target = "stdout")]
fn main() {
    let buffer = heapguard::allocate_typed::<Buffer>();
    unsafe { buffer.as_ptr().write(Buffer { len: 0 }) };

    let label = heapguard::duplicate_string(c"leaked label");
    let temporary = heapguard::allocate(128);
    unsafe { heapguard::deallocate(temporary) };

    println!("buffer len {}", unsafe { buffer.as_ref() }.len);
    std::hint::black_box(label);
}
