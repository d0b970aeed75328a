//! `-l`: suites and mirrorable paths, as configured

use std::io::Write;

use rmirr_common::MirrorsConfig;

use crate::console;

/// Print suites sorted by name, then rules sorted by source and name
pub fn show_list(config: &MirrorsConfig, out: &mut dyn Write) {
    console::line(out, "suites:");
    for (name, paths) in &config.suites {
        console::line(out, &format!("    {name}"));
        for path in paths {
            console::line(out, &format!("        {path}"));
        }
    }

    let mut rules: Vec<_> = config.mirrors.iter().collect();
    rules.sort_by(|a, b| {
        (a.source.to_string(), a.display_name()).cmp(&(b.source.to_string(), b.display_name()))
    });

    console::line(out, "");
    console::line(out, "mirrors:");
    for (i, rule) in rules.iter().enumerate() {
        if i > 0 {
            console::line(out, "");
        }

        let destinations: Vec<String> = rule.destinations.iter().map(|d| d.to_string()).collect();
        let fields = [
            ("name", rule.display_name().to_string()),
            ("comment", rule.comment.clone().unwrap_or_default()),
            ("source", rule.source.to_string()),
            ("names", rule.alias_names.join(" ")),
            ("excludes", rule.excludes.join(" ")),
            ("destinations", destinations.join(" ")),
            ("email recipients", rule.email_recipients.join(" ")),
        ];
        for (label, value) in fields {
            console::line(out, &format!("    {:<17} {}", format!("{label}:"), value));
        }
    }
}
