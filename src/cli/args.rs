use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{Department, EmployeeFields, EmployeeId, SortField, SortOrder, State};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "empdir",
    version,
    about = "employee directory client",
    long_about = "empdir reads and edits an employee directory over its REST API.\n\nClient pages of any size are cut from the server's fixed-size pages, cached briefly and prefetched around the page being viewed.\n\nExamples:\n  empdir list --page 2 --page-size 10\n  empdir list --sort last-name --order desc --filter Sales\n  empdir --server-page-size 50 browse --page-size 20\n  empdir delete --id 42\n\nTip: run `empdir init-config` to write ~/.empdir/config.yml."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        long = "output-format",
        visible_alias = "of",
        value_name = "FORMAT",
        global = true,
        help_heading = "Output",
        help = "Output format: text or json."
    )]
    pub output_format: Option<String>,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.empdir/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "api-url",
        visible_alias = "url",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "Base URL of the directory API."
    )]
    pub api_url: Option<String>,

    #[arg(
        long = "server-page-size",
        visible_alias = "sps",
        value_name = "N",
        global = true,
        help_heading = "Backend",
        help = "Page size the server paginates by (overrides EMPDIR_SERVER_PAGE_SIZE)."
    )]
    pub server_page_size: Option<usize>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "Backend",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<usize>,

    #[arg(
        long = "rate",
        value_name = "RPS",
        global = true,
        help_heading = "Backend",
        help = "Request rate limit (requests per second, 0 for none)."
    )]
    pub rate: Option<u32>,

    #[arg(
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "Backend",
        help = "HTTP proxy URL."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "cache-ttl-ms",
        value_name = "MS",
        global = true,
        help_heading = "Cache",
        help = "How long a fetched server page stays fresh."
    )]
    pub cache_ttl_ms: Option<u64>,

    #[arg(
        long = "no-prefetch",
        global = true,
        help_heading = "Cache",
        help = "Do not prefetch pages around the one being read."
    )]
    pub no_prefetch: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print one client page.
    List {
        #[arg(long = "page", value_name = "N", default_value_t = 0, help = "Zero-based client page.")]
        page: usize,

        #[command(flatten)]
        view: ViewArgs,
    },
    /// Print every client page in order.
    Browse {
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Add an employee.
    Create {
        #[command(flatten)]
        employee: EmployeeArgs,
    },
    /// Replace an employee's fields.
    Update {
        #[arg(long = "id", value_name = "ID")]
        id: EmployeeId,

        #[command(flatten)]
        employee: EmployeeArgs,
    },
    /// Remove an employee.
    Delete {
        #[arg(long = "id", value_name = "ID")]
        id: EmployeeId,
    },
    /// Write the default config file if none exists.
    InitConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ViewArgs {
    #[arg(long = "page-size", value_name = "N", help = "Rows per client page.")]
    pub page_size: Option<usize>,

    #[arg(long = "sort", value_name = "FIELD", help = "Sort attribute, e.g. id, lastName, city.")]
    pub sort: Option<SortField>,

    #[arg(long = "order", value_name = "ORDER", help = "asc or desc.")]
    pub order: Option<SortOrder>,

    #[arg(
        long = "filter",
        value_name = "TOKEN",
        action = ArgAction::Append,
        help = "Filter token (repeatable)."
    )]
    pub filter: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EmployeeArgs {
    #[arg(long = "first-name", value_name = "NAME")]
    pub first_name: String,

    #[arg(long = "last-name", value_name = "NAME")]
    pub last_name: String,

    #[arg(long = "date-of-birth", value_name = "DATE")]
    pub date_of_birth: String,

    #[arg(long = "start-date", value_name = "DATE")]
    pub start_date: String,

    #[arg(long = "street", value_name = "STREET")]
    pub street: String,

    #[arg(long = "city", value_name = "CITY")]
    pub city: String,

    #[arg(long = "zipcode", visible_alias = "zip", value_name = "ZIP")]
    pub zipcode: String,

    #[arg(long = "state", value_name = "CODE", help = "Two-letter state code.")]
    pub state: State,

    #[arg(long = "department", value_name = "NAME")]
    pub department: Department,
}

impl From<EmployeeArgs> for EmployeeFields {
    fn from(args: EmployeeArgs) -> Self {
        EmployeeFields {
            first_name: args.first_name,
            last_name: args.last_name,
            date_of_birth: args.date_of_birth,
            start_date: args.start_date,
            street: args.street,
            city: args.city,
            zipcode: args.zipcode,
            state: args.state,
            department: args.department,
        }
    }
}
