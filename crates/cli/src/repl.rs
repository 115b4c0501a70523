//! The interactive command loop driving a debug session.

use chronogo_debugger::{BreakpointKind, DebugSession, StopReason, WatchMode};
use comfy_table::Table;
use std::io::{self, BufRead, Write};

/// Interactive debugger REPL over a [`DebugSession`].
pub struct Repl {
    session: DebugSession,
}

impl Repl {
    pub fn new(mut session: DebugSession) -> Self {
        session
            .replayer_mut()
            .set_observer(|_, event| println!("{}", event));
        Self { session }
    }

    /// Run the command loop until `quit` or EOF.
    pub fn run(&mut self) -> io::Result<()> {
        println!("ChronoGo Debugger CLI");
        if self.session.has_adapter() {
            println!("Live debugger attached");
        }
        print_help(self.session.has_adapter());

        let stdin = io::stdin();
        let mut input = String::new();
        loop {
            print!("(chrono) ");
            io::stdout().flush()?;

            input.clear();
            if stdin.lock().read_line(&mut input)? == 0 {
                break; // EOF
            }
            if !self.handle_command(input.trim()) {
                break;
            }
        }
        self.session.close();
        Ok(())
    }

    /// Dispatch one command line. Returns false when the loop should end.
    pub fn handle_command(&mut self, input: &str) -> bool {
        let parts: Vec<&str> = input.split_whitespace().collect();
        let Some((&command, args)) = parts.split_first() else {
            return true;
        };

        match command {
            "h" | "help" => print_help(self.session.has_adapter()),
            "c" | "continue" => self.handle_continue(),
            "s" | "step" => self.handle_step(),
            "b" | "backstep" => self.handle_backstep(),
            "i" | "info" => self.handle_info(),
            "bp" | "breakpoint" => self.handle_breakpoint(args),
            "l" | "list" => self.print_breakpoints(),
            "w" | "watch" => self.handle_watch(args),
            "p" | "print" => self.handle_print(args),
            "gr" | "goroutines" => self.handle_goroutines(),
            "q" | "quit" | "exit" => {
                self.session.close();
                return false;
            }
            unknown => {
                println!("Unknown command: {}", unknown);
                print_help(self.session.has_adapter());
            }
        }
        true
    }

    fn handle_continue(&mut self) {
        println!("Continuing execution...");
        match self.session.continue_execution() {
            StopReason::Breakpoint(index) => println!("Breakpoint hit at event {}", index),
            StopReason::EndOfStream => println!("Replay complete"),
        }
        if let Some(event) = self.session.info().current_event {
            println!("Current event: {}", event);
        }
    }

    fn handle_step(&mut self) {
        match self.session.step() {
            Some(event) => println!("Stepped to event: {}", event),
            None => println!("No events loaded"),
        }
    }

    fn handle_backstep(&mut self) {
        match self.session.backstep() {
            Ok(_) => {
                if let Some(event) = self.session.info().current_event {
                    println!("Stepped back to event: {}", event);
                }
            }
            Err(err) => println!("Error stepping backward: {}", err),
        }
    }

    fn handle_info(&mut self) {
        let info = self.session.info();
        match &info.current_event {
            Some(event) => println!("\nCurrent event: {}", event),
            None => println!("\nNo current event"),
        }
        println!(
            "Position: {}/{} - active goroutine {}",
            info.current_index, info.total_events, info.active_goroutine
        );

        if !info.goroutines.is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Goroutine", "State"]);
            for goroutine in &info.goroutines {
                let state = if goroutine.running { "running" } else { "stopped" };
                table.add_row(vec![goroutine.id.to_string(), state.to_string()]);
            }
            println!("{table}");
        }

        if !info.channels.is_empty() {
            let mut table = Table::new();
            table.set_header(vec!["Channel", "Pending", "Closed"]);
            for channel in &info.channels {
                table.add_row(vec![
                    channel.id.to_string(),
                    channel.pending_messages.len().to_string(),
                    channel.closed.to_string(),
                ]);
            }
            println!("{table}");
        }
    }

    fn handle_breakpoint(&mut self, args: &[&str]) {
        let Some((&sub, rest)) = args.split_first() else {
            println!("Usage: bp <file:line>|func:<name>|<EventType> [-c <condition>]");
            println!("       bp list|remove|enable|disable <id>");
            return;
        };

        match sub {
            "list" => self.print_breakpoints(),
            "remove" | "enable" | "disable" => {
                let Some(id) = rest.first().and_then(|s| s.parse().ok()) else {
                    println!("Usage: bp {} <id>", sub);
                    return;
                };
                let result = match sub {
                    "remove" => self.session.remove_breakpoint(id),
                    "enable" => self.session.enable_breakpoint(id),
                    _ => self.session.disable_breakpoint(id),
                };
                match result {
                    Ok(()) => println!("{}d breakpoint {}", sub, id),
                    Err(err) => println!("Error: {}", err),
                }
            }
            spec => {
                // `bp <spec> -c <condition>` sets a conditional breakpoint.
                let condition = match rest {
                    ["-c", condition @ ..] if !condition.is_empty() => Some(condition.join(" ")),
                    _ => None,
                };
                match self
                    .session
                    .add_breakpoint_with_condition(spec, condition.as_deref())
                {
                    Ok(bp) => match condition {
                        Some(cond) => println!("Breakpoint {} set at {} (condition: {})", bp.id, spec, cond),
                        None => println!("Breakpoint {} set at {}", bp.id, spec),
                    },
                    Err(err) => println!("Error setting breakpoint: {}", err),
                }
            }
        }
    }

    fn print_breakpoints(&self) {
        let breakpoints = self.session.breakpoints();
        if breakpoints.is_empty() {
            println!("No breakpoints set");
            return;
        }
        let mut table = Table::new();
        table.set_header(vec!["ID", "Kind", "Target", "Status"]);
        for bp in breakpoints {
            let (kind, target) = match &bp.kind {
                BreakpointKind::Location { file, line } => ("location", format!("{}:{}", file, line)),
                BreakpointKind::Function { name } => ("function", name.clone()),
                BreakpointKind::EventType { tag } => ("event", tag.clone()),
                BreakpointKind::Watchpoint { expr, mode } => ("watch", format!("{} ({})", expr, mode)),
            };
            table.add_row(vec![
                bp.id.to_string(),
                kind.to_string(),
                target,
                if bp.enabled { "enabled" } else { "disabled" }.to_string(),
            ]);
        }
        println!("{table}");
    }

    fn handle_watch(&mut self, args: &[&str]) {
        let (mode, expr) = match args {
            ["-r", expr @ ..] if !expr.is_empty() => (WatchMode::Read, expr.join(" ")),
            ["-w", expr @ ..] if !expr.is_empty() => (WatchMode::Write, expr.join(" ")),
            ["-rw", expr @ ..] if !expr.is_empty() => (WatchMode::ReadWrite, expr.join(" ")),
            [expr @ ..] if !expr.is_empty() => (WatchMode::ReadWrite, expr.join(" ")),
            _ => {
                println!("Usage: watch [-r|-w|-rw] <expression>");
                return;
            }
        };

        let watchpoint = self.session.add_watchpoint(&expr, mode);
        println!("Replay watchpoint {} set on expression '{}'", watchpoint.id, expr);
        println!("Note: watchpoints match recorded statement executions during replay.");
    }

    fn handle_print(&mut self, args: &[&str]) {
        let Some(name) = args.first() else {
            println!("Usage: print <variable>");
            return;
        };
        match self.session.print_variable(name) {
            Ok(variable) => {
                println!("{} = {} (type: {})", variable.name, variable.value, variable.type_name)
            }
            Err(err) => println!("Error getting variable '{}': {}", name, err),
        }
    }

    fn handle_goroutines(&mut self) {
        match self.session.list_goroutines() {
            Ok(goroutines) => {
                let mut table = Table::new();
                table.set_header(vec!["Goroutine", "Function", "Location"]);
                for goroutine in goroutines {
                    table.add_row(vec![
                        goroutine.id.to_string(),
                        goroutine.location.function.clone(),
                        format!("{}:{}", goroutine.location.file, goroutine.location.line),
                    ]);
                }
                println!("{table}");
            }
            Err(err) => println!("Error listing goroutines: {}", err),
        }
    }
}

fn print_help(has_adapter: bool) {
    println!("\nAvailable commands:");
    println!("  continue (c)      - Continue until the next breakpoint");
    println!("  step (s)          - Step forward one event");
    println!("  backstep (b)      - Step backward one event");
    println!("  info (i)          - Show current execution state");
    println!("  bp <spec>         - Set a breakpoint (file:line, func:<name>, or event type)");
    println!("  bp list|remove|enable|disable <id>");
    println!("  list (l)          - List all breakpoints");
    println!("  watch (w) [-r|-w|-rw] <expr> - Set a watchpoint");
    if has_adapter {
        println!("  print (p) <var>   - Print a variable from the live target");
        println!("  goroutines (gr)   - List goroutines in the live target");
    }
    println!("  help (h)          - Show this help message");
    println!("  quit (q)          - Exit the debugger");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronogo_recorder::{Event, EventKind};
    use chronogo_replay::Replayer;

    fn repl_with(events: Vec<Event>) -> Repl {
        let mut replayer = Replayer::new();
        replayer.load(events);
        Repl::new(DebugSession::new(replayer))
    }

    fn tiny_program() -> Vec<Event> {
        vec![
            Event::new(EventKind::FuncEntry, "Entering main"),
            Event::new(EventKind::FuncEntry, "Entering f"),
            Event::new(EventKind::FuncExit, "Exiting f"),
            Event::new(EventKind::FuncExit, "Exiting main"),
        ]
    }

    #[test]
    fn test_quit_ends_loop() {
        let mut repl = repl_with(tiny_program());
        assert!(repl.handle_command("step"));
        assert!(!repl.handle_command("q"));
    }

    #[test]
    fn test_continue_and_backstep_flow() {
        let mut repl = repl_with(tiny_program());
        assert!(repl.handle_command("bp func:f"));
        assert!(repl.handle_command("c"));
        assert_eq!(repl.session.info().current_index, 1);
        assert!(repl.handle_command("b"));
        assert_eq!(repl.session.info().current_index, 0);
    }

    #[test]
    fn test_breakpoint_management_commands() {
        let mut repl = repl_with(tiny_program());
        repl.handle_command("bp main.go:10");
        repl.handle_command("bp func:f");
        assert_eq!(repl.session.breakpoints().len(), 2);

        repl.handle_command("bp disable 1");
        assert!(!repl.session.breakpoints()[0].enabled);
        repl.handle_command("bp enable 1");
        assert!(repl.session.breakpoints()[0].enabled);
        repl.handle_command("bp remove 2");
        assert_eq!(repl.session.breakpoints().len(), 1);
    }

    #[test]
    fn test_watch_command_modes() {
        let mut repl = repl_with(tiny_program());
        repl.handle_command("w -r x");
        repl.handle_command("w -w y");
        repl.handle_command("w z");
        let watchpoints = repl.session.list_watchpoints();
        assert_eq!(watchpoints.len(), 3);
    }

    #[test]
    fn test_unknown_and_empty_commands_keep_looping() {
        let mut repl = repl_with(tiny_program());
        assert!(repl.handle_command(""));
        assert!(repl.handle_command("frobnicate"));
    }
}
