fn main() {
    #[cfg(feature = "cli")]
    vcpatch::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("vcpatch: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
