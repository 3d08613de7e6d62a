//! Port discovery utilities

use colored::*;
use tracing::info;

use super::source::{MidiError, MidiSource};

/// Information about a MIDI input port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
}

/// Discover input ports
pub fn discover_input_ports(source: &dyn MidiSource) -> Result<Vec<PortInfo>, MidiError> {
    let ports = source
        .input_names()?
        .into_iter()
        .enumerate()
        .map(|(index, name)| {
            let is_virtual =
                name.contains("Virtual") || name.contains("loopMIDI") || name.contains("IAC");
            PortInfo {
                index,
                name,
                is_virtual,
            }
        })
        .collect();
    Ok(ports)
}

/// Log discovered input ports, one per line
pub fn log_input_ports(source: &dyn MidiSource) -> Result<(), MidiError> {
    let ports = discover_input_ports(source)?;

    info!("{}", "MIDI IN Ports:".bold());
    if ports.is_empty() {
        info!("  {}", "(none)".dimmed());
    }
    for port in &ports {
        let virtual_tag = if port.is_virtual { " [VIRTUAL]" } else { "" };
        info!("  [{}] {}{}", port.index, port.name.green(), virtual_tag.yellow());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMidiSource;

    #[test]
    fn test_discover_marks_virtual_ports() {
        let source =
            FakeMidiSource::with_inputs(&["Glover", "loopMIDI Port 1", "IAC Driver Bus 1"]);
        let ports = discover_input_ports(&source).unwrap();

        assert_eq!(ports.len(), 3);
        assert_eq!(
            ports[0],
            PortInfo {
                index: 0,
                name: "Glover".to_string(),
                is_virtual: false,
            }
        );
        assert!(ports[1].is_virtual);
        assert!(ports[2].is_virtual);
        assert!(log_input_ports(&source).is_ok());
    }
}
