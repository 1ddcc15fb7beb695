use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use tamkit_inference::validate::{ModelValidator, ValidationReport};

pub fn validate_model(model_path: &Path, test: bool) -> ValidationReport {
    let mut validator = ModelValidator::new(model_path);
    validator.validate();
    if test && validator.report().valid {
        validator.test_inference();
    }
    validator.into_report()
}

/// Prints the report and maps validity to the process exit code.
pub fn run_validate(model_path: &Path, test: bool, json: bool) -> Result<ExitCode> {
    let report = validate_model(model_path, test);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_summary());
    }

    Ok(if report.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
