fn main() -> anyhow::Result<()> {
    battalion_example::cli()?.main()
}
