use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use temingo::config::{self, ConfigOverrides, SiteConfig};
use temingo::{filter, output, rebuild, site, watch};

#[derive(Parser)]
#[command(name = "temingo")]
#[command(about = "Template-driven static site generator")]
#[command(long_about = "\
Template-driven static site generator

Renders every *.template file of the input directory against the merged
values files and writes the result, extension stripped, to the output
directory. All paths are relative to the working directory.

Project structure:

  .
  ├── temingo.toml                   # Optional settings (see gen-config)
  ├── values.yaml                    # Values, available to every template
  ├── .temingoignore                 # Exclusions, one glob per line (** = any depth)
  ├── partials/
  │   └── header.partial             # {% include 'header' %}
  ├── static/                        # Copied verbatim into output/
  ├── index.html.template            # → output/index.html
  └── blog/
      ├── index.html.template        # list() iterates blog/*/index.yaml
      ├── post.html.single.template  # Rendered once per item below
      └── first-post/
          └── index.yaml             # → output/blog/first-post/post.html

Template variables:
  breadcrumbs   [{Name, Path}] for every parent directory
  Item          the item's index.yaml (single views only)
  ItemPath      the item's URL path, e.g. /blog/first-post (single views only)

Template functions:
  safeHTML, safeCSS, addPercentage, include, list, urlize, capitalize

Run 'temingo gen-config' to generate a documented temingo.toml.")]
#[command(version)]
struct Cli {
    /// Values file; repeat to deep-merge several, later files win
    #[arg(short = 'f', long = "valuesfile", global = true)]
    values_files: Vec<String>,

    /// Template directory
    #[arg(short = 'i', long, global = true)]
    input_dir: Option<String>,

    /// Partial template directory
    #[arg(short = 'p', long, global = true)]
    partials_dir: Option<String>,

    /// Output directory; its contents are replaced on every build
    #[arg(short = 'o', long, global = true)]
    output_dir: Option<String>,

    /// Static directory, copied verbatim into the output directory
    #[arg(short = 's', long, global = true)]
    static_dir: Option<String>,

    /// Extension of page templates
    #[arg(short = 't', long, global = true)]
    template_extension: Option<String>,

    /// Extension of single-view templates
    #[arg(long, global = true)]
    single_template_extension: Option<String>,

    /// Extension of partial templates
    #[arg(long, global = true)]
    partial_extension: Option<String>,

    /// Ignore file with exclusion patterns
    #[arg(long = "temingoignore", global = true)]
    ignore_file: Option<String>,

    /// Keep running and rebuild on every change
    #[arg(short = 'w', long, global = true)]
    watch: bool,

    /// Log per-file detail
    #[arg(short = 'd', long, global = true)]
    debug: bool,

    /// Settings file
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Build the site once (the default)
    Build,
    /// Build, then rebuild on every change (same as --watch)
    Watch,
    /// Validate settings and list what a build would render, without writing
    Check,
    /// Print a stock temingo.toml with all options documented
    GenConfig,
}

enum Mode {
    Build,
    Watch,
    Check,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            values_files: (!self.values_files.is_empty()).then(|| self.values_files.clone()),
            input_dir: self.input_dir.clone(),
            partials_dir: self.partials_dir.clone(),
            output_dir: self.output_dir.clone(),
            static_dir: self.static_dir.clone(),
            template_extension: self.template_extension.clone(),
            single_template_extension: self.single_template_extension.clone(),
            partial_extension: self.partial_extension.clone(),
            ignore_file: self.ignore_file.clone(),
        }
    }
}

fn setup_logging(debug: bool) {
    let level = if debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.debug);

    let mode = match &cli.command {
        Some(Command::GenConfig) => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        Some(Command::Check) => Mode::Check,
        Some(Command::Watch) => Mode::Watch,
        Some(Command::Build) | None if cli.watch => Mode::Watch,
        Some(Command::Build) | None => Mode::Build,
    };

    let root = Path::new(".");
    let site_config = config::load_config(root, &cli.config, &cli.overrides())?;
    log_settings(&site_config);
    site_config.validate(root)?;

    match mode {
        Mode::Check => {
            let filter = filter::ExclusionSet::load(root, &site_config)?;
            let inventory = site::inventory(root, &site_config, &filter)?;
            output::print_check_output(&inventory, &site_config.partial_extension);
            println!("==> Project is valid");
        }
        Mode::Watch => {
            watch::watch(root, &site_config, output::print_build_output)?;
        }
        Mode::Build => {
            let report = rebuild::rebuild(root, &site_config)?;
            output::print_build_output(&report);
        }
    }

    Ok(())
}

fn log_settings(config: &SiteConfig) {
    log::debug!("valuesfiles: {:?}", config.values_files);
    log::debug!("inputDir: {}", config.input_dir);
    log::debug!("partialsDir: {}", config.partials_dir);
    log::debug!("outputDir: {}", config.output_dir);
    log::debug!("staticDir: {}", config.static_dir);
    log::debug!("templateExtension: {}", config.template_extension);
    log::debug!("singleTemplateExtension: {}", config.single_template_extension);
    log::debug!("partialExtension: {}", config.partial_extension);
    log::debug!("temingoignore: {}", config.ignore_file);
}
