use clap::{Arg, Command};

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("argon2-memory-kib")
                .long("argon2-memory-kib")
                .help("Argon2id memory cost in KiB")
                .env("SNIPPETBOX_ARGON2_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("argon2-iterations")
                .long("argon2-iterations")
                .help("Argon2id iterations")
                .env("SNIPPETBOX_ARGON2_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("argon2-parallelism")
                .long("argon2-parallelism")
                .help("Argon2id lanes")
                .env("SNIPPETBOX_ARGON2_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32)),
        )
}
