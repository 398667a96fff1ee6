use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command, ValueHint};
use log::LevelFilter;

use loanrisk_classifiers::task::LoanTask;
use loanrisk_cli::app::cache::ModelCache;
use loanrisk_cli::app::currency::{resolve_rates, ExchangeRatesApi, Offline, RateProvider};
use loanrisk_cli::app::default_risk::DefaultRiskApp;
use loanrisk_cli::app::eligibility::EligibilityApp;
use loanrisk_cli::app::{run_session, FrontEnd, SessionOptions};
use loanrisk_cli::explain::run_explain;
use loanrisk_cli::predict::{run_predict, verdict, PredictParams};
use loanrisk_cli::prepare::{run_prepare, PrepareParams, DEFAULT_CLEAN_PATH};
use loanrisk_cli::train::input::TrainConfig;
use loanrisk_cli::train::trainer;

const TASKS: [&str; 2] = ["default_risk", "eligibility"];

fn config_arg() -> Arg {
    Arg::new("config")
        .help("Path to a JSON configuration file. Defaults are used when omitted.")
        .required(false)
        .value_parser(clap::value_parser!(PathBuf))
        .value_hint(ValueHint::FilePath)
}

fn data_arg() -> Arg {
    Arg::new("data")
        .short('d')
        .long("data")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help("Path to the dataset (*.csv or *.tsv). Overrides the data_path in the configuration file.")
        .value_hint(ValueHint::FilePath)
}

fn task_arg() -> Arg {
    Arg::new("task")
        .short('t')
        .long("task")
        .help("Prediction task. Overrides the task in the configuration file.")
        .value_parser(TASKS)
}

fn model_dir_arg() -> Arg {
    Arg::new("model_dir")
        .short('m')
        .long("model-dir")
        .value_parser(clap::builder::NonEmptyStringValueParser::new())
        .help("Model bundle directory. Defaults to models/<task>.")
        .value_hint(ValueHint::DirPath)
}

fn app_command(name: &'static str, about: &'static str, default_dir: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new("model_dir")
                .short('m')
                .long("model-dir")
                .help("Model bundle directory")
                .default_value(default_dir)
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::DirPath),
        )
        .arg(
            Arg::new("no_explain")
                .long("no-explain")
                .help("Do not print attributions under each verdict.")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("explain_dir")
                .long("explain-dir")
                .help("Write a force-plot HTML page for every prediction into this directory.")
                .value_parser(clap::value_parser!(PathBuf))
                .value_hint(ValueHint::DirPath),
        )
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Error)
        .parse_env(env_logger::Env::default().filter_or("LOANRISK_LOG", "error,loanrisk=info"))
        .init();

    let matches = Command::new("loanrisk")
        .version(clap::crate_version!())
        .about("\u{1F3E6} loanrisk - Loan default and eligibility modelling")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("prepare")
                .about("Clean the raw Lending Club export into the modelling dataset")
                .arg(
                    Arg::new("raw")
                        .help("Path to the raw Lending Club export (*.csv or *.tsv)")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("output_file")
                        .short('o')
                        .long("output")
                        .help(format!("Path of the cleaned CSV. Defaults to {}.", DEFAULT_CLEAN_PATH))
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("sample_size")
                        .long("sample-size")
                        .help("Number of rows kept after cleaning.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .help("Seed of the subsampling RNG.")
                        .value_parser(clap::value_parser!(u64)),
                ),
        )
        .subcommand(
            Command::new("train")
                .about("Train, evaluate and explain a gradient-boosted classifier")
                .arg(config_arg())
                .arg(data_arg())
                .arg(task_arg())
                .arg(model_dir_arg().help(
                    "Directory the model bundle is written to. Overrides the output_dir in the configuration file.",
                ))
                .arg(
                    Arg::new("rounds")
                        .long("rounds")
                        .help("Number of boosting rounds. Overrides model.num_boost_round.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("bootstrap_iterations")
                        .long("bootstrap-iterations")
                        .help("Number of bootstrap resamples for the ROC-AUC interval.")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    Arg::new("report")
                        .long("report")
                        .help("Path of the HTML training report.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("evaluate")
                .about("Evaluate a persisted model on its held-out partition")
                .arg(config_arg())
                .arg(data_arg())
                .arg(task_arg())
                .arg(model_dir_arg())
                .arg(
                    Arg::new("bootstrap_iterations")
                        .long("bootstrap-iterations")
                        .help("Number of bootstrap resamples for the ROC-AUC interval.")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("explain")
                .about("Write the global attribution summary of a persisted model")
                .arg(config_arg())
                .arg(data_arg())
                .arg(task_arg())
                .arg(model_dir_arg())
                .arg(
                    Arg::new("shap_summary")
                        .short('o')
                        .long("output")
                        .help("Path of the SVG summary image.")
                        .value_parser(clap::builder::NonEmptyStringValueParser::new())
                        .value_hint(ValueHint::FilePath),
                )
                .arg(
                    Arg::new("sample_size")
                        .long("sample-size")
                        .help("Number of rows explained.")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Score one applicant record")
                .arg(
                    Arg::new("record")
                        .help("Path to a JSON object with the applicant's attributes")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                )
                .arg(task_arg().default_value("eligibility"))
                .arg(
                    Arg::new("model_dir")
                        .short('m')
                        .long("model-dir")
                        .help("Model bundle directory. Defaults to models/<task>.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::DirPath),
                )
                .arg(
                    Arg::new("explain")
                        .long("explain")
                        .help("Write an HTML page with the force plot of this prediction.")
                        .value_parser(clap::value_parser!(PathBuf))
                        .value_hint(ValueHint::FilePath),
                ),
        )
        .subcommand(
            Command::new("app")
                .about("Interactive terminal predictors")
                .subcommand_required(true)
                .subcommand(app_command(
                    "default-risk",
                    "Predict the probability of default for a Lending Club applicant",
                    "models/default_risk",
                ))
                .subcommand(
                    app_command(
                        "eligibility",
                        "Predict loan eligibility with currency conversion",
                        "models/eligibility",
                    )
                    .arg(
                        Arg::new("offline")
                            .long("offline")
                            .help("Skip the exchange rate service and use the fallback rates.")
                            .action(ArgAction::SetTrue),
                    ),
                ),
        )
        .help_template(
            "{usage-heading} {usage}\n\n\
             {about-with-newline}\n\
             Version {version}\n\n\
             {all-args}{after-help}",
        )
        .get_matches();

    match matches.subcommand() {
        Some(("prepare", sub_m)) => handle_prepare(sub_m),
        Some(("train", sub_m)) => handle_train(sub_m),
        Some(("evaluate", sub_m)) => handle_evaluate(sub_m),
        Some(("explain", sub_m)) => handle_explain(sub_m),
        Some(("predict", sub_m)) => handle_predict(sub_m),
        Some(("app", sub_m)) => handle_app(sub_m),
        _ => unreachable!("Subcommand is required by CLI configuration"),
    }
}

fn exit_on_error<T>(stage: &str, result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            log::error!("{} failed: {:#}", stage, e);
            std::process::exit(1)
        }
    }
}

fn stage_config(stage: &str, matches: &ArgMatches) -> TrainConfig {
    let config_path: Option<&PathBuf> = matches.get_one("config");
    match config_path {
        Some(path) => log::info!("[loanrisk::{}] Using config: {:?}", stage, path),
        None => log::info!("[loanrisk::{}] No config provided; using defaults.", stage),
    }
    let config = exit_on_error(stage, TrainConfig::from_arguments(config_path, matches));
    if config_path.is_none() {
        let default_json = serde_json::to_string_pretty(&config).unwrap_or_default();
        eprintln!("[loanrisk::{}] Default config:\n{}", stage, default_json);
    }
    config
}

fn handle_prepare(matches: &ArgMatches) -> Result<()> {
    let params = exit_on_error("Preparation", PrepareParams::from_arguments(matches));
    log::info!("[loanrisk::prepare] Cleaning {:?}", params.raw_path);
    let summary = exit_on_error("Preparation", run_prepare(&params));
    println!(
        "Cleaned dataset: {} rows ({} charged off) -> {}",
        summary.n_rows,
        summary.n_charged_off,
        params.output_path.display()
    );
    Ok(())
}

fn handle_train(matches: &ArgMatches) -> Result<()> {
    let config = stage_config("train", matches);
    let outcome = exit_on_error("Training", trainer::run_training(&config));
    println!("{}", outcome.evaluation);
    println!("Top features by mean |SHAP value|:");
    for (name, value) in outcome.importance.iter().take(5) {
        println!("  {:<24} {:.4}", name, value);
    }
    Ok(())
}

fn handle_evaluate(matches: &ArgMatches) -> Result<()> {
    let config = stage_config("evaluate", matches);
    let report = exit_on_error("Evaluation", trainer::run_evaluation(&config));
    println!("{}", report);
    Ok(())
}

fn handle_explain(matches: &ArgMatches) -> Result<()> {
    let config = stage_config("explain", matches);
    let importance = exit_on_error("Explanation", run_explain(&config));
    println!("SHAP summary plot saved to {}", config.shap_summary);
    for (name, value) in &importance {
        println!("  {:<24} {:.4}", name, value);
    }
    Ok(())
}

fn handle_predict(matches: &ArgMatches) -> Result<()> {
    let task: LoanTask = exit_on_error(
        "Prediction",
        matches
            .get_one::<String>("task")
            .map(|t| t.parse::<LoanTask>().map_err(anyhow::Error::msg))
            .unwrap_or(Ok(LoanTask::Eligibility)),
    );
    let model_dir = matches
        .get_one::<PathBuf>("model_dir")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("models").join(task.to_string()));
    let params = PredictParams {
        task,
        model_dir,
        record_path: matches
            .get_one::<PathBuf>("record")
            .cloned()
            .unwrap_or_default(),
        explain_path: matches.get_one::<PathBuf>("explain").cloned(),
    };
    let prediction = exit_on_error("Prediction", run_predict(&params));
    println!("Prediction: {}", verdict(task, &prediction));
    if let Some(path) = &params.explain_path {
        println!("Explanation written to {}", path.display());
    }
    Ok(())
}

fn handle_app(matches: &ArgMatches) -> Result<()> {
    let Some((name, sub_m)) = matches.subcommand() else {
        unreachable!("Subcommand is required by CLI configuration")
    };
    let front_end: Box<dyn FrontEnd> = match name {
        "default-risk" => Box::new(DefaultRiskApp::new()),
        "eligibility" => {
            let provider: Box<dyn RateProvider> = if sub_m.get_flag("offline") {
                Box::new(Offline)
            } else {
                Box::new(ExchangeRatesApi::from_env())
            };
            Box::new(EligibilityApp::new(resolve_rates(provider.as_ref())))
        }
        _ => unreachable!(),
    };

    let model_dir: PathBuf = sub_m
        .get_one::<PathBuf>("model_dir")
        .cloned()
        .unwrap_or_default();
    let mut cache = ModelCache::from_dir(model_dir);
    let options = SessionOptions {
        explain: !sub_m.get_flag("no_explain"),
        explain_dir: sub_m.get_one::<PathBuf>("explain_dir").cloned(),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let n = exit_on_error(
        "Session",
        run_session(front_end.as_ref(), &mut cache, &options, &mut input, &mut output),
    );
    log::info!("[loanrisk::app] {} predictions made", n);
    Ok(())
}
