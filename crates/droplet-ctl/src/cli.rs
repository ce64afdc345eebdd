use clap::{Args, Parser, Subcommand, ValueEnum};
use droplet_lifecycle::DesiredSpec;

/// Manage a single DigitalOcean droplet declaratively.
///
/// Reads `DIGITALOCEAN_TOKEN` and the `DROPLET_*` timeouts from the
/// environment (or `.env`). States are printed to stdout as JSON.
#[derive(Debug, Parser)]
#[command(name = "droplet-ctl", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a droplet and wait until it is active.
    Create(SpecArgs),

    /// Print the current state of a droplet, or `null` if it does not exist.
    Read { id: String },

    /// Change name, size and/or image in place.
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        size: Option<String>,
        #[arg(long)]
        image: Option<String>,
    },

    /// Destroy a droplet and wait until it is gone.
    Delete { id: String },

    /// Print whether a droplet exists.
    Exists { id: String },

    /// Run the live acceptance scenarios (creates and destroys real droplets).
    Acceptance {
        #[arg(long, value_enum, default_value_t = Scenario::All)]
        scenario: Scenario,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    Basic,
    Update,
    All,
}

#[derive(Debug, Args)]
pub struct SpecArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub size: String,
    /// Image slug or numeric image id.
    #[arg(long)]
    pub image: String,
    #[arg(long)]
    pub region: String,
    /// SSH key id, repeatable.
    #[arg(long = "ssh-key")]
    pub ssh_keys: Vec<u64>,
    #[arg(long)]
    pub backups: bool,
    #[arg(long)]
    pub ipv6: bool,
    #[arg(long)]
    pub private_networking: bool,
    #[arg(long)]
    pub user_data: Option<String>,
}

impl From<SpecArgs> for DesiredSpec {
    fn from(args: SpecArgs) -> Self {
        Self {
            name: args.name,
            size: args.size,
            image: args.image,
            region: args.region,
            ssh_keys: args.ssh_keys.into_iter().collect(),
            backups_enabled: args.backups,
            ipv6_enabled: args.ipv6,
            private_networking: args.private_networking,
            user_data: args.user_data,
        }
    }
}
