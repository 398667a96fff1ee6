//! End-to-end runs of the `loanrisk` binary on small synthetic datasets.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("loanrisk").unwrap()
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// Loan-prediction style table; approval follows credit history and the
/// repayment burden, with every tenth label flipped.
fn write_eligibility_csv(path: &Path, n: usize) {
    let mut csv = String::from(
        "Loan_ID,Gender,Married,Dependents,Education,Self_Employed,ApplicantIncome,CoapplicantIncome,LoanAmount,Loan_Amount_Term,Credit_History,Property_Area,Loan_Status\n",
    );
    let areas = ["Urban", "Rural", "Semiurban"];
    for i in 0..n {
        let income = 1_500 + (i * 397) % 8_000;
        let coincome = if i % 4 == 0 { 0 } else { (i * 131) % 3_000 };
        let amount = 60 + (i * 53) % 300;
        let term = if i % 7 == 0 { 180 } else { 360 };
        let history = if i % 5 == 0 { "0" } else { "1" };
        let burden = amount as f64 / term as f64 / (income + coincome) as f64;
        let approved = (history == "1" && burden < 0.00015) != (i % 10 == 3);
        let gender = if i % 3 == 0 { "Female" } else { "Male" };
        let married = if i % 2 == 0 { "Yes" } else { "No" };
        let education = if i % 6 == 0 { "Not Graduate" } else { "Graduate" };
        writeln!(
            csv,
            "LP{:04},{},{},{},{},No,{},{},{},{},{},{},{}",
            i,
            gender,
            married,
            i % 3,
            education,
            income,
            coincome,
            amount,
            term,
            history,
            areas[i % 3],
            if approved { "Y" } else { "N" }
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}

/// Raw Lending Club style export with textual term and employment length.
fn write_raw_lending_club_csv(path: &Path, n: usize) {
    let mut csv = String::from(
        "id,loan_amnt,term,int_rate,grade,emp_length,annual_inc,dti,fico_range_low,inq_last_6mths,open_acc,pub_rec,loan_status\n",
    );
    let grades = ["A", "B", "C", "D", "E", "F", "G"];
    for i in 0..n {
        let g = (i * 3) % 7;
        let status = match i % 11 {
            0 => "Current",
            _ if (g >= 4) != (i % 9 == 0) => "Charged Off",
            _ => "Fully Paid",
        };
        let emp_length = match i % 4 {
            0 => "10+ years".to_string(),
            1 => "< 1 year".to_string(),
            _ => format!("{} years", i % 9),
        };
        writeln!(
            csv,
            "{},{},{},{:.2},{},{},{},{:.1},{},{},{},{},{}",
            i,
            1_000 + (i * 250) % 30_000,
            if i % 3 == 0 { " 60 months" } else { " 36 months" },
            6.0 + g as f64 * 3.0 + (i % 5) as f64 * 0.2,
            grades[g],
            emp_length,
            30_000 + (i * 700) % 90_000,
            5.0 + (i % 30) as f64,
            640 + (i * 10) % 200,
            i % 4,
            3 + i % 15,
            i32::from(i % 13 == 0),
            status
        )
        .unwrap();
    }
    fs::write(path, csv).unwrap();
}

fn write_train_config(dir: &Path, data: &Path, task: &str) -> std::path::PathBuf {
    let config = serde_json::json!({
        "task": task,
        "data_path": data.to_str().unwrap(),
        "output_dir": dir.join("model").to_str().unwrap(),
        "model": { "num_boost_round": 25, "max_depth": 3 },
        "bootstrap": { "n_iterations": 50 },
        "explain_sample_size": 40,
        "shap_summary": dir.join("shap_summary.svg").to_str().unwrap(),
        "report": dir.join("report.html").to_str().unwrap()
    });
    let path = dir.join("train.json");
    fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Eligibility: train, evaluate, explain, predict, app
// ---------------------------------------------------------------------------

#[test]
fn eligibility_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("loan_prediction.csv");
    write_eligibility_csv(&data, 300);
    let config = write_train_config(dir.path(), &data, "eligibility");
    let model_dir = dir.path().join("model");

    cmd()
        .arg("train")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("ROC-AUC: "))
        .stdout(predicate::str::contains("Bootstrapped ROC-AUC: "));
    for file in ["model.json", "columns.json", "categorical.json", "train_config.json"] {
        assert!(model_dir.join(file).exists(), "{} missing", file);
    }
    assert!(dir.path().join("report.html").exists());
    assert!(fs::read_to_string(dir.path().join("shap_summary.svg"))
        .unwrap()
        .starts_with("<svg"));

    let categorical: Vec<String> =
        serde_json::from_str(&fs::read_to_string(model_dir.join("categorical.json")).unwrap()).unwrap();
    assert!(categorical.contains(&"Gender".to_string()));
    assert!(!categorical.contains(&"Loan_ID".to_string()));

    cmd()
        .arg("evaluate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("F1 Score: "));

    let summary = dir.path().join("explain.svg");
    cmd()
        .arg("explain")
        .arg(&config)
        .arg("-o")
        .arg(&summary)
        .assert()
        .success()
        .stdout(predicate::str::contains("EMI_to_Income_Ratio"));
    assert!(summary.exists());

    // the reference applicant
    let record = dir.path().join("applicant.json");
    fs::write(
        &record,
        r#"{"Gender": "Male", "Married": "Yes", "Education": "Graduate", "Self_Employed": "No",
            "Property_Area": "Urban", "ApplicantIncome": 5000, "CoapplicantIncome": 2000,
            "LoanAmount": 150, "Loan_Amount_Term": 360, "Credit_History": 1.0}"#,
    )
    .unwrap();
    let predict = || {
        let output = cmd()
            .args(["predict", "-t", "eligibility", "-m"])
            .arg(&model_dir)
            .arg(&record)
            .output()
            .unwrap();
        assert!(output.status.success());
        String::from_utf8(output.stdout).unwrap()
    };
    let first = predict();
    assert!(first.contains("Loan "));
    assert_eq!(first, predict());

    let page = dir.path().join("applicant.html");
    cmd()
        .args(["predict", "-t", "eligibility", "-m"])
        .arg(&model_dir)
        .arg(&record)
        .arg("--explain")
        .arg(&page)
        .assert()
        .success();
    assert!(fs::read_to_string(&page).unwrap().contains("EMI"));

    cmd()
        .args(["app", "eligibility", "--offline", "-m"])
        .arg(&model_dir)
        .write_stdin(format!("{}q\n", "\n".repeat(11)))
        .assert()
        .success()
        .stdout(predicate::str::contains("Using fallback conversion rates"))
        .stdout(predicate::str::contains("Loan "))
        .stdout(predicate::str::contains("Explanation (log-odds)"));
}

// ---------------------------------------------------------------------------
// Default risk: prepare, train, app
// ---------------------------------------------------------------------------

#[test]
fn default_risk_pipeline_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let raw = dir.path().join("accepted.csv");
    write_raw_lending_club_csv(&raw, 400);
    let clean = dir.path().join("data").join("clean.csv");

    cmd()
        .arg("prepare")
        .arg(&raw)
        .arg("-o")
        .arg(&clean)
        .args(["--sample-size", "1000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleaned dataset"));
    let cleaned = fs::read_to_string(&clean).unwrap();
    let header = cleaned.lines().next().unwrap();
    assert_eq!(
        header,
        "loan_amnt,term,int_rate,grade,emp_length,annual_inc,dti,fico_range_low,inq_last_6mths,open_acc,pub_rec,target"
    );
    assert!(!cleaned.contains("months"));

    let model_dir = dir.path().join("models").join("default_risk");
    cmd()
        .current_dir(dir.path())
        .arg("train")
        .arg("-d")
        .arg(&clean)
        .arg("-m")
        .arg(&model_dir)
        .args(["--rounds", "20", "--bootstrap-iterations", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ROC-AUC: "))
        .stderr(predicate::str::contains("Default config"));
    assert!(dir.path().join("shap_summary.svg").exists());
    assert!(dir.path().join("loanrisk_trainer_report.html").exists());

    let explain_dir = dir.path().join("explanations");
    cmd()
        .args(["app", "default-risk", "--no-explain", "-m"])
        .arg(&model_dir)
        .arg("--explain-dir")
        .arg(&explain_dir)
        .write_stdin(format!("{}\n{}q\n", "\n".repeat(11), "\n".repeat(11)))
        .assert()
        .success()
        .stdout(predicate::str::contains("Probability of Default").count(2))
        .stdout(predicate::str::contains("Explanation (log-odds)").not());
    assert!(explain_dir.join("explanation_1.html").exists());
    assert!(explain_dir.join("explanation_2.html").exists());
}
