use crate::layout::CloudLayout;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub width: f64,
    pub height: f64,
    pub words: Vec<WordDump>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WordDump {
    pub key: String,
    pub index: usize,
    pub text: String,
    pub weight: f64,
    pub left: f64,
    pub top: f64,
    pub font_size: f64,
    pub rotation_degrees: f64,
    pub font: String,
    pub color: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &CloudLayout) -> Self {
        let words = layout
            .words
            .iter()
            .map(|word| WordDump {
                key: word.key.clone(),
                index: word.index,
                text: word.text.clone(),
                weight: word.weight,
                left: word.left,
                top: word.top,
                font_size: word.font_size,
                rotation_degrees: word.rotation.to_degrees(),
                font: word.css_font(),
                color: word.color.clone(),
            })
            .collect();

        LayoutDump {
            width: layout.width,
            height: layout.height,
            words,
        }
    }
}

/// Writes the dump as pretty JSON to `path`, or stdout when `None`.
pub fn write_layout_dump(path: Option<&Path>, layout: &CloudLayout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    match path {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &dump)?;
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, &dump)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ir::RawWord;
    use crate::layout::compute_layout;

    #[test]
    fn dump_lists_every_word_in_camel_case() {
        let words = vec![RawWord::weighted("north", 2.0), RawWord::weighted("south", 1.0)];
        let layout = compute_layout(&words, &Config::default(), true).unwrap();
        let value = serde_json::to_value(LayoutDump::from_layout(&layout)).unwrap();
        let dumped = value["words"].as_array().unwrap();
        assert_eq!(dumped.len(), 2);
        assert_eq!(dumped[0]["text"], "north");
        assert!(dumped[0]["fontSize"].as_f64().unwrap() > 0.0);
        assert!(dumped[0]["font"].as_str().unwrap().ends_with("serif"));
    }
}
