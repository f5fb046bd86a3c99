fn main() -> anyhow::Result<()> {
    outbreak_engine::cli::main()
}
