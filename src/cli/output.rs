//! CLI output formatting.
//!
//! Reports are formatted into strings first so the layout can be tested;
//! the `print_*` functions only write them to stdout.

use std::fmt::Write;

use crate::scenarios::first_order_delay::{ONE_TAU_FRACTION, THREE_TAU_FRACTION};
use crate::scenarios::{DelayReport, EpidemicReport, PerceptionReport, VaccinationReport};

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Version line, with the commit hash when built from a git checkout.
#[must_use]
pub fn version_string() -> String {
    let hash = env!("DYNSIM_GIT_HASH");
    if hash.is_empty() {
        format!("dynsim {}", env!("DYNSIM_VERSION"))
    } else {
        format!("dynsim {} ({hash})", env!("DYNSIM_VERSION"))
    }
}

/// Print version information.
pub fn print_version() {
    println!("{}", version_string());
}

/// Print help message.
pub fn print_help() {
    println!("{HELP}");
}

/// Print the reason a command line was rejected, then the help text, to stderr.
pub fn print_usage_error(reason: &str) {
    eprintln!("Error: {reason}\n");
    eprintln!("{HELP}");
}

const HELP: &str = r"dynsim - System dynamics and epidemic simulations

USAGE:
    dynsim <COMMAND> [OPTIONS]

COMMANDS:
    delay                       First-order delay stock with a step in inflow
    erlang                      Perception loop through a third-order delay
    sir                         SIR epidemic
    vaccinate                   SIR epidemic with a vaccination pulse
        -c, --config <FILE>     Load parameters from a YAML file
        -o, --json <FILE>       Write report and trajectory as JSON
        -v, --verbose           Enable debug logging

    run <config.yaml>           Run every scenario with one configuration
        -v, --verbose           Enable debug logging

    help                        Show this help message
    version                     Show version information

EXAMPLES:
    dynsim delay
    dynsim erlang --json erlang.json
    dynsim sir --config outbreak.yaml -v
    dynsim run scenarios.yaml

LOGGING:
    Diagnostics go to stderr; set RUST_LOG to override the filter
    (default: dynsim=info).
";

fn header(out: &mut String, title: &str) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{RULE}");
}

fn footer(out: &mut String, ok: bool, summary: &str) {
    let sym = if ok { "✓" } else { "✗" };
    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "{sym} {summary}");
    let _ = writeln!(out, "{RULE}");
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Format the first-order delay report.
#[must_use]
pub fn format_delay_report(report: &DelayReport) -> String {
    let mut out = String::new();
    header(&mut out, "First-Order Delay");

    let _ = writeln!(out, "\nParameters:");
    let _ = writeln!(out, "  Delay (τ):   {:.2} days", report.delay);
    let _ = writeln!(out, "  Timestep:    {:.2} days", report.dt);

    let _ = writeln!(out, "\nEquilibria (inflow × τ):");
    let _ = writeln!(out, "  Initial:     {:.2}", report.initial_equilibrium);
    let _ = writeln!(out, "  Final:       {:.2}", report.final_equilibrium);

    let _ = writeln!(out, "\nStock:");
    let _ = writeln!(out, "  Before step: {}", optional(report.stock_before_change));
    let _ = writeln!(out, "  At step:     {}", optional(report.stock_at_change));
    let _ = writeln!(out, "  Final:       {:.2}", report.final_stock);
    let _ = writeln!(out, "  Final gap:   {:+.3}", report.final_gap);

    let _ = writeln!(out, "\nFlows at end:");
    let _ = writeln!(out, "  Inflow:      {:.2}", report.final_inflow);
    let _ = writeln!(out, "  Outflow:     {:.2}", report.final_outflow);
    let _ = writeln!(out, "  Imbalance:   {:.3}", report.final_flow_imbalance);

    let _ = writeln!(out, "\nTime constants:");
    let _ = writeln!(
        out,
        "  {:.1}% after {:.1} days (τ)",
        ONE_TAU_FRACTION * 100.0,
        report.time_to_63_percent
    );
    let _ = writeln!(
        out,
        "  {:.1}% after {:.1} days (3τ)",
        THREE_TAU_FRACTION * 100.0,
        report.time_to_95_percent
    );
    let _ = writeln!(
        out,
        "  Max Euler error, first phase: {:.4}",
        report.max_first_phase_error
    );

    let settled = report.final_flow_imbalance < 0.5;
    footer(
        &mut out,
        settled,
        if settled {
            "Stock settled near the new equilibrium"
        } else {
            "Stock still adjusting at end of run"
        },
    );
    out
}

/// Format the perception-loop report.
#[must_use]
pub fn format_perception_report(report: &PerceptionReport) -> String {
    let mut out = String::new();
    header(&mut out, "Perception Delay (Erlang)");

    let _ = writeln!(out, "\nParameters:");
    let _ = writeln!(out, "  Target:      {:.2}", report.target);
    let _ = writeln!(out, "  Order:       {}", report.order);
    let _ = writeln!(out, "  Stage τ:     {:.2} days", report.stage_time_constant);

    let _ = writeln!(out, "\nResponse:");
    let _ = writeln!(
        out,
        "  Peak stock:  {:.2} at day {:.0}",
        report.peak_stock, report.peak_time
    );
    let _ = writeln!(out, "  Overshoot:   {:.2}", report.overshoot);
    let _ = writeln!(out, "  Final stock: {:.2}", report.final_stock);
    let _ = writeln!(out, "  Perceived:   {:.2}", report.final_perceived);
    let _ = writeln!(out, "  Final gap:   {:+.3}", report.final_gap);

    let _ = writeln!(
        out,
        "\nOver-corrections ({}):",
        report.overcorrections.len()
    );
    for window in &report.overcorrections {
        let _ = writeln!(out, "  days {:.0} → {:.0}", window.start, window.end);
    }

    let settled = report.final_gap.abs() <= 0.01 * report.target.abs().max(1.0);
    footer(
        &mut out,
        settled,
        &format!(
            "{} target crossings from acting on delayed information",
            report.overcorrections.len()
        ),
    );
    out
}

fn write_epidemic_body(out: &mut String, report: &EpidemicReport) {
    let _ = writeln!(out, "\nParameters:");
    let _ = writeln!(out, "  R0:          {:.2}", report.r0);
    let _ = writeln!(
        out,
        "  Herd immunity threshold: {:.1}%",
        report.herd_immunity_threshold * 100.0
    );

    let _ = writeln!(out, "\nInfection peak:");
    let _ = writeln!(
        out,
        "  Sampled:     {:.1} at day {:.1}",
        report.peak_infected, report.peak_time
    );
    let _ = writeln!(out, "  Analytic:    {:.1}", report.analytic_peak);

    let _ = writeln!(out, "\nHerd immunity:");
    match &report.herd_crossing {
        Some(crossing) => {
            let _ = writeln!(
                out,
                "  Reached at day {:.1} (S = {:.1}, R = {:.1})",
                crossing.time, crossing.susceptible, crossing.recovered
            );
        }
        None => {
            let _ = writeln!(out, "  Not reached");
        }
    }

    let state = &report.final_state;
    let _ = writeln!(out, "\nFinal state (day {:.1}):", state.time);
    let _ = writeln!(out, "  Susceptible: {:.1}", state.susceptible);
    let _ = writeln!(out, "  Infected:    {:.1}", state.infected);
    let _ = writeln!(out, "  Recovered:   {:.1}", state.recovered);
    let _ = writeln!(out, "  Analytic final size: {:.1}", report.analytic_final_size);
}

/// Format the SIR report.
#[must_use]
pub fn format_epidemic_report(report: &EpidemicReport) -> String {
    let mut out = String::new();
    header(&mut out, "SIR Epidemic");
    write_epidemic_body(&mut out, report);

    let over = report.final_state.is_over();
    footer(
        &mut out,
        over,
        if over {
            "Epidemic burned out within the horizon"
        } else {
            "Infections still present at end of horizon"
        },
    );
    out
}

/// Format the vaccination report.
#[must_use]
pub fn format_vaccination_report(report: &VaccinationReport) -> String {
    let mut out = String::new();
    header(&mut out, "SIR Epidemic with Vaccination");

    let _ = writeln!(out, "\nIntervention:");
    let _ = writeln!(out, "  Day:         {:.1}", report.intervention_time);
    let _ = writeln!(out, "  Coverage:    {:.0}%", report.coverage * 100.0);
    let _ = writeln!(out, "  Vaccinated:  {:.1}", report.vaccinated);
    let _ = writeln!(out, "  Infected at intervention: {:.1}", report.infected_at_intervention);
    let _ = writeln!(out, "  Peak after intervention:  {:.1}", report.peak_after_intervention);

    write_epidemic_body(&mut out, &report.epidemic);

    footer(
        &mut out,
        true,
        &format!("{:.1} individuals infected in total", report.infected_total),
    );
    out
}

/// Print the first-order delay report.
pub fn print_delay_report(report: &DelayReport) {
    print!("{}", format_delay_report(report));
}

/// Print the perception-loop report.
pub fn print_perception_report(report: &PerceptionReport) {
    print!("{}", format_perception_report(report));
}

/// Print the SIR report.
pub fn print_epidemic_report(report: &EpidemicReport) {
    print!("{}", format_epidemic_report(report));
}

/// Print the vaccination report.
pub fn print_vaccination_report(report: &VaccinationReport) {
    print!("{}", format_vaccination_report(report));
}
