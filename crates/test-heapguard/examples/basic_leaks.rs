use eyre::Result;
use std::io;

fn main() -> Result<()> {
    let config = heapguard::allocate(11);
    let scratch = heapguard::allocate(22);
    let names = heapguard::allocate_zeroed(3, 11);

    unsafe { heapguard::deallocate(scratch) };
    std::hint::black_box((config, names));

    heapguard::report_leaks(&mut io::stdout().lock())
        .map_err(|e| eyre::eyre!("Leak report failed: {}", e))?;

    Ok(())
}
