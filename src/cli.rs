// Copyright (c) AlphaVelocity.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use clap::{crate_version, Arg, ArgAction, Command};

fn json_flags(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("json")
            .long("json")
            .action(ArgAction::SetTrue)
            .help("Print as pretty JSON"),
    )
    .arg(
        Arg::new("jsonl")
            .long("jsonl")
            .action(ArgAction::SetTrue)
            .conflicts_with("json")
            .help("Print as JSON lines"),
    )
}

pub fn build_cli() -> Command {
    Command::new("mealbills")
        .version(crate_version!())
        .about("Student meal bills from the subsidy portal, kept in a local ledger")
        .subcommand_required(false)
        .subcommand(Command::new("init").about("Create the local database"))
        .subcommand(
            Command::new("refresh")
                .about("Log in if needed and download new bills")
                .arg(
                    Arg::new("offline")
                        .long("offline")
                        .action(ArgAction::SetTrue)
                        .help("Open an exported bills file instead of the portal"),
                )
                .arg(
                    Arg::new("no-prompt")
                        .long("no-prompt")
                        .action(ArgAction::SetTrue)
                        .help("Never ask for credentials; rely on auto-login"),
                ),
        )
        .subcommand(
            Command::new("bills")
                .about("Show stored bills")
                .subcommand(json_flags(
                    Command::new("list")
                        .about("List bills within the date range")
                        .arg(Arg::new("from").long("from").help("YYYY-MM-DD, overrides the saved range"))
                        .arg(Arg::new("to").long("to").help("YYYY-MM-DD, overrides the saved range")),
                ))
                .subcommand(json_flags(
                    Command::new("summary").about("Totals of the bills within the date range"),
                ))
                .subcommand(
                    Command::new("range")
                        .about("Save the date range used by list, summary and articles")
                        .arg(Arg::new("from").long("from").help("YYYY-MM-DD; omit for no lower bound"))
                        .arg(Arg::new("to").long("to").help("YYYY-MM-DD; the newest bill's date follows new bills")),
                ),
        )
        .subcommand(json_flags(
            Command::new("articles").about("Distinct articles bought within the date range"),
        ))
        .subcommand(
            Command::new("export")
                .about("Export stored bills")
                .arg(
                    Arg::new("format")
                        .long("format")
                        .default_value("json")
                        .value_parser(["json", "csv"]),
                )
                .arg(Arg::new("out").long("out").required(true)),
        )
        .subcommand(
            Command::new("import")
                .about("Merge bills from an exported JSON file")
                .arg(Arg::new("path").long("path").required(true)),
        )
        .subcommand(Command::new("logout").about("Log out and forget stored credentials"))
        .subcommand(
            Command::new("config")
                .about("Show or change settings")
                .subcommand(Command::new("show").about("Print settings"))
                .subcommand(
                    Command::new("set-url")
                        .about("Override a portal location")
                        .arg(
                            Arg::new("key")
                                .long("key")
                                .required(true)
                                .value_parser(["base", "login", "logout", "student", "bills"]),
                        )
                        .arg(Arg::new("value").long("value").required(true)),
                ),
        )
}
