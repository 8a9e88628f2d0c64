use crate::cli::args::{CliArgs, Command, EmployeeArgs};

/// Flag-level checks. Numeric ranges are checked after merging with the
/// config file, in `app::build_run_config`.
pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(raw) = args.output_format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!("invalid --output-format '{raw}', expected text or json"));
        }
    }
    match &args.command {
        Command::Create { employee } | Command::Update { employee, .. } => {
            validate_employee(employee)?;
        }
        Command::List { .. } | Command::Browse { .. } | Command::Delete { .. } | Command::InitConfig => {}
    }
    Ok(())
}

fn validate_employee(employee: &EmployeeArgs) -> Result<(), String> {
    let required = [
        ("first-name", &employee.first_name),
        ("last-name", &employee.last_name),
        ("date-of-birth", &employee.date_of_birth),
        ("start-date", &employee.start_date),
        ("street", &employee.street),
        ("city", &employee.city),
        ("zipcode", &employee.zipcode),
    ];
    for (flag, value) in required {
        if value.trim().is_empty() {
            return Err(format!("--{flag} cannot be empty"));
        }
    }
    Ok(())
}
