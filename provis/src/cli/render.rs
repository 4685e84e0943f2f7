// provis/src/cli/render.rs
use colored::Colorize;
use provis_common::model::{Operand, ProvisioningPlan};
use provis_common::status::{Severity, Status};

/// Prints the plan's operands, or the status tree when it cannot proceed.
pub fn print_plan(plan: &ProvisioningPlan) {
    if !plan.is_success() {
        print_status(plan.status());
        return;
    }
    if plan.is_empty() && plan.property_operands().is_empty() {
        println!("{}", "Nothing to do".green());
    }
    for operand in plan.all_operands() {
        let line = operand.to_string();
        let line = match operand {
            Operand::Add(_) => line.green(),
            Operand::Remove(_) => line.red(),
            Operand::Update { .. } => line.yellow(),
            Operand::Property(_) => line.dimmed(),
        };
        println!("{line}");
    }
    if !plan.status().children().is_empty() {
        print_status(plan.status());
    }
}

pub fn print_status(status: &Status) {
    let text = status.flatten();
    let text = match status.severity() {
        Severity::Ok | Severity::Info => text.normal(),
        Severity::Warning => text.yellow(),
        Severity::Error => text.red(),
        Severity::Canceled => text.magenta(),
    };
    print!("{text}");
}
