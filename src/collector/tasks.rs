//! Windows scheduled tasks, read from their XML definitions.

use super::{Collector, Launch, RawEntry};
use crate::autorun::AutorunType;
use crate::env::Environment;
use anyhow::Result;
use quick_xml::Reader;
use quick_xml::events::Event as XmlEvent;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub struct ScheduledTasks {
    tasks_root: PathBuf,
}

impl ScheduledTasks {
    pub fn new(tasks_root: impl Into<PathBuf>) -> Self {
        Self {
            tasks_root: tasks_root.into(),
        }
    }

    /// `%SystemRoot%\System32\Tasks`.
    pub fn from_env(env: &Environment) -> Self {
        let system_root = env
            .get_var("SystemRoot")
            .unwrap_or_else(|| r"C:\Windows".to_string());
        Self::new(format!(r"{system_root}\System32\Tasks"))
    }

    /// Task path relative to the tasks root, as the Task Scheduler shows it.
    fn task_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.tasks_root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!(r"\{}", parts.join(r"\"))
    }
}

impl Collector for ScheduledTasks {
    fn name(&self) -> &'static str {
        "tasks"
    }

    fn collect(&self) -> Result<Vec<RawEntry>> {
        if !self.tasks_root.is_dir() {
            debug!(dir = %self.tasks_root.display(), "task folder not present");
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for item in WalkDir::new(&self.tasks_root).sort_by_file_name() {
            let item = match item {
                Ok(item) => item,
                Err(err) => {
                    debug!(%err, "task folder entry skipped");
                    continue;
                }
            };
            if !item.file_type().is_file() {
                continue;
            }

            let path = item.path();
            let xml = match fs::read(path) {
                Ok(bytes) => decode_task_xml(&bytes),
                Err(err) => {
                    debug!(task = %path.display(), %err, "task skipped");
                    continue;
                }
            };

            let location = self.task_path(path);
            let name = item.file_name().to_string_lossy().into_owned();
            entries.extend(exec_actions(&xml).into_iter().map(|(command, arguments)| {
                let launch = Launch::Split { command, arguments };
                RawEntry::new(AutorunType::Task, &location, &name, launch)
            }));
        }
        Ok(entries)
    }
}

/// Task files are UTF-16LE with a byte-order mark, or plain UTF-8.
fn decode_task_xml(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExecField {
    Command,
    Arguments,
}

/// An `<Exec>` action being read.
#[derive(Debug, Default)]
struct ExecAction {
    command: String,
    arguments: String,
}

impl ExecAction {
    fn field_mut(&mut self, field: ExecField) -> &mut String {
        match field {
            ExecField::Command => &mut self.command,
            ExecField::Arguments => &mut self.arguments,
        }
    }
}

/// `(command, arguments)` of every `<Exec>` action.
///
/// Parsing stops at the first malformed construct; actions completed before
/// it are kept.
fn exec_actions(xml: &str) -> Vec<(String, String)> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut actions = Vec::new();
    let mut current: Option<ExecAction> = None;
    let mut field: Option<ExecField> = None;

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(ref e)) => match e.local_name().as_ref() {
                b"Exec" => current = Some(ExecAction::default()),
                b"Command" if current.is_some() => field = Some(ExecField::Command),
                b"Arguments" if current.is_some() => field = Some(ExecField::Arguments),
                _ => field = None,
            },
            Ok(XmlEvent::Text(ref text)) => {
                if let (Some(action), Some(field)) = (current.as_mut(), field) {
                    match text.unescape() {
                        Ok(value) => action.field_mut(field).push_str(&value),
                        Err(err) => debug!(%err, "task action text skipped"),
                    }
                }
            }
            Ok(XmlEvent::CData(ref data)) => {
                if let (Some(action), Some(field)) = (current.as_mut(), field) {
                    action.field_mut(field).push_str(&String::from_utf8_lossy(data));
                }
            }
            Ok(XmlEvent::End(ref e)) => match e.local_name().as_ref() {
                b"Exec" => {
                    if let Some(action) = current.take() {
                        let command = action.command.trim();
                        if !command.is_empty() {
                            let arguments = action.arguments.trim().to_string();
                            actions.push((command.to_string(), arguments));
                        }
                    }
                    field = None;
                }
                b"Command" | b"Arguments" => field = None,
                _ => {}
            },
            Ok(XmlEvent::Eof) => break,
            Err(err) => {
                debug!(position = reader.buffer_position(), %err, "task XML malformed");
                break;
            }
            Ok(_) => {}
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    const TASK: &str = r#"<?xml version="1.0" encoding="UTF-16"?>
<Task version="1.2" xmlns="http://schemas.microsoft.com/windows/2004/02/mit/task">
  <Triggers><LogonTrigger><Enabled>true</Enabled></LogonTrigger></Triggers>
  <Actions Context="Author">
    <Exec>
      <Command>"C:\Program Files\Updater\update.exe"</Command>
      <Arguments>/silent &amp; /c:&quot;x&quot;</Arguments>
    </Exec>
    <ComHandler><ClassId>{00000000-0000-0000-0000-000000000000}</ClassId></ComHandler>
    <Exec>
      <Command>%windir%\system32\cleanup.exe</Command>
    </Exec>
  </Actions>
</Task>"#;

    fn utf16le(text: &str) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xFE];
        bytes.extend(text.encode_utf16().flat_map(u16::to_le_bytes));
        bytes
    }

    #[test]
    fn test_exec_actions() {
        assert_eq!(
            exec_actions(TASK),
            vec![
                (
                    r#""C:\Program Files\Updater\update.exe""#.to_string(),
                    r#"/silent & /c:"x""#.to_string()
                ),
                (r"%windir%\system32\cleanup.exe".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn test_commented_out_actions_are_ignored() {
        let xml = concat!(
            r"<Actions><!-- <Exec><Command>C:\old\removed.exe</Command></Exec> -->",
            r"<Exec><Command>C:\a.exe</Command></Exec></Actions>",
        );
        assert_eq!(exec_actions(xml), vec![(r"C:\a.exe".to_string(), String::new())]);
    }

    #[test]
    fn test_cdata_and_character_references() {
        let xml = concat!(
            r"<Exec><Command><![CDATA[C:\x & y.exe]]></Command>",
            "<Arguments>&#65;&#x42; &lt;c&gt;</Arguments></Exec>",
        );
        assert_eq!(
            exec_actions(xml),
            vec![(r"C:\x & y.exe".to_string(), "AB <c>".to_string())]
        );
    }

    #[test]
    fn test_command_outside_exec_is_ignored() {
        let xml = concat!(
            "<Task><Command>stray.exe</Command>",
            "<Exec><Arguments>-x</Arguments></Exec></Task>",
        );
        assert!(exec_actions(xml).is_empty());
    }

    #[test]
    fn test_malformed_xml_keeps_completed_actions() {
        let xml = concat!(
            "<Actions><Exec><Command>a.exe</Command></Exec>",
            "<Exec><Command>b.exe</Oops></Actions>",
        );
        assert_eq!(exec_actions(xml), vec![("a.exe".to_string(), String::new())]);
    }

    #[test]
    fn test_decode_task_xml() {
        assert_eq!(decode_task_xml(&utf16le("<Task/>")), "<Task/>");
        assert_eq!(decode_task_xml(b"\xEF\xBB\xBF<Task/>"), "<Task/>");
        assert_eq!(decode_task_xml(b"<Task/>"), "<Task/>");
    }

    #[test]
    fn test_collect_nested_tasks() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Vendor")).unwrap();
        fs::write(dir.path().join("Vendor").join("Update"), utf16le(TASK)).unwrap();
        fs::write(dir.path().join("Empty"), "<Task><Actions/></Task>").unwrap();

        let entries = ScheduledTasks::new(dir.path()).collect().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].location, r"\Vendor\Update");
        assert_eq!(entries[0].entry, "Update");
        assert_eq!(
            entries[1].launch,
            Launch::Split {
                command: r"%windir%\system32\cleanup.exe".to_string(),
                arguments: String::new(),
            }
        );
    }

    #[test]
    fn test_missing_task_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert!(ScheduledTasks::new(dir.path().join("Tasks")).collect().unwrap().is_empty());
    }

    #[test]
    fn test_from_env() {
        let env = Environment::with_vars(crate::env::Flavor::Windows, [("SYSTEMROOT", r"D:\Win")]);
        assert_eq!(
            ScheduledTasks::from_env(&env).tasks_root,
            PathBuf::from(r"D:\Win\System32\Tasks")
        );
    }
}
