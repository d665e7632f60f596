//! Fixed-column text rendering for [`crate::engine::Simulation::report`].

/// One row of the report table, already reduced to plain values so this
/// module never needs to know about [`crate::facility::Facility`].
pub(crate) struct FacilityRow {
    pub display_name: String,
    pub util: f64,
    pub busy_period: f64,
    pub mean_queue_length: f64,
    pub releases: u64,
    pub preempt_count: u64,
    pub queue_exit_count: u64,
}

/// Renders a facility's name as `name[n]` when it has more than one server,
/// or plain `name` otherwise.
pub(crate) fn display_name(name: &str, n_servers: usize) -> String {
    if n_servers > 1 {
        format!("{name}[{n_servers}]")
    } else {
        name.to_string()
    }
}

pub(crate) fn render(model_name: &str, clock: f64, interval: f64, rows: &[FacilityRow]) -> String {
    let mut out = String::new();
    out.push_str("\n");
    out.push_str("smpl SIMULATION REPORT\n");
    out.push_str("\n\n");
    out.push_str(&format!("MODEL {model_name:<56}TIME: {clock:11.3}\n"));
    out.push_str(&format!("{:>68}{interval:11.3}\n", "INTERVAL: "));
    out.push('\n');
    out.push_str("MEAN BUSY     MEAN QUEUE        OPERATION COUNTS\n");
    out.push_str(" FACILITY          UTIL.     PERIOD        LENGTH     RELEASE   PREEMPT   QUEUE\n");

    for row in rows {
        out.push_str(&format!(
            " {:<17}{:6.4} {:10.3} {:13.3} {:11} {:9} {:7}\n",
            row.display_name,
            row.util,
            row.busy_period,
            row.mean_queue_length,
            row.releases,
            row.preempt_count,
            row.queue_exit_count,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_adds_bracketed_count_only_for_multiple_servers() {
        assert_eq!(display_name("cpu", 1), "cpu");
        assert_eq!(display_name("cpu", 3), "cpu[3]");
    }

    #[test]
    fn render_includes_model_name_and_facility_row() {
        let rows = vec![FacilityRow {
            display_name: "cpu".to_string(),
            util: 0.5,
            busy_period: 2.0,
            mean_queue_length: 1.25,
            releases: 4,
            preempt_count: 1,
            queue_exit_count: 2,
        }];
        let text = render("m1", 10.0, 10.0, &rows);
        assert!(text.contains("smpl SIMULATION REPORT"));
        assert!(text.contains("MODEL m1"));
        assert!(text.contains("cpu"));
    }
}
