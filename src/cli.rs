// Command-line surface. Flag parsing stays here; the parsed values are
// turned into the plain form-field map the engine posts.

use std::collections::BTreeMap;

use clap::{Args, Parser, Subcommand};

/// Create source-code repositories remotely from the command line.
#[derive(Debug, Parser)]
#[command(name = "mkrepo", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a repository on the hosting provider.
    ///
    /// Example: create a private c++ repository called gorepo:
    ///
    /// ```text
    /// mkrepo create -n gorepo -l c++ -p -d Best repo ever
    /// ```
    Create(CreateArgs),

    /// Store the username and password used to authenticate against the
    /// hosting provider.
    Login,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Name of the repository.
    #[arg(short, long)]
    pub name: String,

    /// Description of the repository. Takes every following word, so it
    /// works best as the last flag.
    #[arg(short, long, num_args = 1.., default_value = "")]
    pub description: Vec<String>,

    /// Source control type.
    #[arg(short, long, default_value = "hg")]
    pub scm: String,

    /// Coding language (must be lowercase).
    #[arg(short, long, default_value = "go")]
    pub language: String,

    /// Hide the repository from the public.
    #[arg(short = 'p', long = "private")]
    pub is_private: bool,

    /// Seconds to allow each network attempt before giving up.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

impl CreateArgs {
    /// The form fields the provider expects for a create call. Booleans are
    /// encoded as `true`/`false` strings.
    pub fn form_fields(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("name".to_string(), self.name.clone()),
            ("description".to_string(), self.description.join(" ")),
            ("scm".to_string(), self.scm.clone()),
            ("language".to_string(), self.language.clone()),
            ("is_private".to_string(), self.is_private.to_string()),
        ])
    }
}
