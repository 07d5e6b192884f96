use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "deskbook", version, about = "Seat and room booking service")]
pub struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, env = "DESKBOOK_CONFIG", default_value = "config.yaml")]
    pub config: String,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use clap::Parser;

    use super::Args;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn config_path_defaults_and_overrides() {
        let args = Args::parse_from(["deskbook"]);
        assert_eq!(args.config, "config.yaml");

        let args = Args::parse_from(["deskbook", "--config", "/etc/deskbook.yaml"]);
        assert_eq!(args.config, "/etc/deskbook.yaml");
    }
}
