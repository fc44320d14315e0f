//! Output formatting for run summaries and errors

use anyhow::Error;
use colored::Colorize;
use serde_json::json;

use crate::run::Summary;

/// Print the error in JSON format
pub fn print_error_json(error: &Error, exit_code: i32) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "causes": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
            "exit_code": exit_code,
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print the error and its causes in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    for cause in error.chain().skip(1) {
        eprintln!("  {} {}", "Caused by:".yellow(), cause);
    }
}

/// Print the run summary in the requested format
pub fn print_summary(summary: &Summary, json: bool) {
    if json {
        let output = json!({
            "success": true,
            "summary": summary,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format summary as JSON: {e}"),
        }
        return;
    }

    println!("{}", "Simulation summary:".bold());
    println!("  Mode:            {}", summary.mode);
    match (&summary.function, summary.function_end) {
        (Some(name), Some(end)) => {
            let state = if summary.function_finished { "finished".green() } else { "running".yellow() };
            println!("  Function:        {name} (ends at {end:.6} s, {state})");
        }
        _ => println!("  Function:        {}", "none".dimmed()),
    }
    println!("  Iterations:      {}", summary.iterations);
    println!("  Final reference: {:.6}", summary.final_ref);
    println!("  Final meas:      {:.6}", summary.final_meas);

    let max_err = format!("{:.6}", summary.max_abs_err);
    let max_err = if summary.err_fault { max_err.red() } else { max_err.normal() };
    println!("  Max abs error:   {max_err}");
    println!("  Limited iters:   {}", summary.limited_iterations);
    println!("  Invalid meas:    {}", summary.invalid_meas);
    if let Some(status) = summary.rst_status {
        println!("  RST status:      {status}");
    }
}
