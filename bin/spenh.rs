use spenh::{Enhancer, Parameters, Profile};
use spenh::wave;

use std::process::ExitCode;

use clap::{Arg, Command};
use tracing::error;


mod telemetry {
    use std::sync::OnceLock;

    use tracing::Level;
    use tracing_subscriber::{fmt, EnvFilter};

    static TELEMETRY_INIT: OnceLock<()> = OnceLock::new();

    pub fn init() {
        TELEMETRY_INIT.get_or_init(|| {
            let env_filter = EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("spenh=info"))
                .unwrap_or_else(|_| EnvFilter::default().add_directive(Level::INFO.into()));

            if let Err(err) = fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .compact()
                .with_writer(std::io::stderr)
                .try_init()
            {
                eprintln!("[telemetry] failed to initialise tracing subscriber: {}", err);
            }
        });
    }
}


fn app() -> Command<'static> {
    Command::new("Speech enhancement via multi-stage spectral subtraction")
        .author(clap::crate_authors!())
        .version(clap::crate_version!())
        .arg(Arg::new("input")
                .help("The input file to use (mono wav)")
                .value_name("INPUT")
                .required(true))
        .arg(Arg::new("output")
                .help("The file to write the result to (wav)")
                .value_name("OUTPUT")
                .required(false))
        .arg(Arg::new("level")
                .help("The enhancement profile (low, medium, high, advanced, extreme)")
                .value_name("PROFILE")
                .short('l')
                .long("level")
                .takes_value(true)
                .default_value("medium"))
        .arg(Arg::new("params")
                .help("The parameters to use (as yaml file)")
                .value_name("PARAMS")
                .short('p')
                .long("params")
                .takes_value(true))
        .arg(Arg::new("report")
                .help("Print the run report (as yaml)")
                .long("report"))
}

fn run() -> spenh::Result<()> {
    let matches = app().get_matches();
    let path_in = matches.value_of_os("input").unwrap_or_default();
    let path_out = matches.value_of_os("output");
    let path_params = matches.value_of_os("params");
    let show_report = matches.is_present("report");

    let profile: Profile = matches.value_of("level").unwrap_or("medium").parse()?;

    // load parameters
    let params = match path_params {
        Some(path) => Parameters::from_path(path)?,
        None => Parameters::default(),
    };

    // load input, mono only
    let input = wave::read_wav::<f64, _>(path_in)?;

    // probe and run
    let enhancer = Enhancer::new(profile, &params, input.sample_rate())?;
    let enhanced = enhancer.enhance(&input)?;

    // write
    if let Some(path_out) = path_out {
        wave::write_wav(path_out, &enhanced.waveform)?;
    }

    let level = &enhanced.report.level;
    println!("profile:  {} ({:?} tier)", enhanced.report.profile, enhanced.report.tier);
    println!("input:    {:6.1} dB rms, {:6.1} dB peak", level.input.loudness_db(), level.input.peak_db());
    println!("output:   {:6.1} dB rms, {:6.1} dB peak", level.output.loudness_db(), level.output.peak_db());
    println!("change:   {:+6.1} dB (gain {:+.1} dB)", level.loudness_change_db(), level.gain_db);

    if show_report {
        match serde_yaml::to_string(&enhanced.report) {
            Ok(yaml) => print!("{}", yaml),
            Err(err) => error!(%err, "failed to serialize report"),
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    telemetry::init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(kind = ?err.kind(), "{}", err);
            ExitCode::FAILURE
        },
    }
}
