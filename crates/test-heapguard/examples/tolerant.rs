use eyre::Result;

fn main() -> Result<()> {
    match heapguard::try_allocate(isize::MAX as usize) {
        Ok(block) => eyre::bail!("Expected exhaustion, got {:p}", block),
        Err(err) => println!("recovered: {}", err),
    }

    let block = heapguard::try_allocate(64)?;
    unsafe { heapguard::deallocate(block) };
    println!("still running");

    Ok(())
}
