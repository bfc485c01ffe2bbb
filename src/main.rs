fn main() -> anyhow::Result<()> {
    sniptex::run()?;
    Ok(())
}
