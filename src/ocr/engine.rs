use anyhow::{Context, Result, anyhow};
use image::GrayImage;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::recognizer::{OcrText, Recognizer, TextBox};

/// Digits only, for both single-glyph and box modes.
const DIGIT_WHITELIST: &str = "tessedit_char_whitelist=0123456789";

/// Treat the image as a single character.
const PSM_SINGLE_CHAR: &str = "10";

/// Assume a single uniform block of text.
const PSM_BLOCK: &str = "6";

/// How often a running Tesseract process is checked for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Represents a line of OCR text with confidence score
#[derive(Debug, Clone)]
pub struct OcrLine {
    pub text: String,
    pub words: Vec<OcrWord>,
    pub confidence: f32,
}

/// Represents a single word from OCR with confidence score and position
#[derive(Debug, Clone)]
pub struct OcrWord {
    pub text: String,
    pub confidence: f32,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Runs the Tesseract executable on temporary PNGs.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    executable: PathBuf,
    tessdata: Option<PathBuf>,
    language: String,
}

impl TesseractRecognizer {
    pub fn new(executable: PathBuf, tessdata: Option<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            executable,
            tessdata,
            language: language.into(),
        }
    }

    /// Runs Tesseract with TSV output and returns structured lines. The
    /// process is killed if it outlives `limit`.
    fn run_tsv(&self, img: &GrayImage, psm: &str, limit: Option<Duration>) -> Result<Vec<OcrLine>> {
        // Save image to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write Tesseract input image")?;

        // Tesseract appends .tsv to the output base
        let temp_output = NamedTempFile::new()?;
        let output_base = temp_output.path().to_string_lossy().to_string();

        let mut command = Command::new(&self.executable);
        command.arg(temp_input.path()).arg(&output_base);
        if let Some(tessdata) = &self.tessdata {
            command.arg("--tessdata-dir").arg(tessdata);
        }
        let mut child = command
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(psm)
            .arg("-c")
            .arg(DIGIT_WHITELIST)
            .arg("tsv")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        let status = wait_within(&mut child, limit)?;
        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            return Err(anyhow!("Tesseract failed ({}): {}", status, stderr.trim()));
        }

        let tsv_path = format!("{}.tsv", output_base);
        let tsv_content = std::fs::read_to_string(&tsv_path)
            .map_err(|e| anyhow!("Failed to read Tesseract output: {}", e))?;
        let _ = std::fs::remove_file(&tsv_path);

        Ok(parse_tsv_output(&tsv_content))
    }
}

impl Recognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize_text(&self, img: &GrayImage, limit: Option<Duration>) -> Result<OcrText> {
        let lines = self.run_tsv(img, PSM_SINGLE_CHAR, limit)?;
        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let confidence = lines
            .iter()
            .map(|l| l.confidence)
            .fold(None, |best: Option<f32>, c| Some(best.map_or(c, |b| b.max(c))));
        Ok(OcrText { text, confidence })
    }

    fn recognize_boxes(&self, img: &GrayImage, limit: Option<Duration>) -> Result<Vec<TextBox>> {
        let lines = self.run_tsv(img, PSM_BLOCK, limit)?;
        Ok(lines
            .into_iter()
            .flat_map(|line| line.words)
            .map(|w| TextBox {
                text: w.text,
                left: w.left,
                top: w.top,
                width: w.width,
                height: w.height,
                confidence: Some(w.confidence),
            })
            .collect())
    }
}

/// Waits for `child` to exit, killing it once `limit` has passed.
fn wait_within(child: &mut Child, limit: Option<Duration>) -> Result<ExitStatus> {
    let Some(limit) = limit else {
        return child.wait().context("Failed to wait for Tesseract");
    };

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("Failed to wait for Tesseract")? {
            return Ok(status);
        }
        if started.elapsed() >= limit {
            let _ = child.kill();
            let _ = child.wait();
            return Err(anyhow!("Tesseract killed after {}ms", limit.as_millis()));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Parses Tesseract TSV output into structured OcrLine data
pub fn parse_tsv_output(tsv: &str) -> Vec<OcrLine> {
    let mut lines: Vec<OcrLine> = Vec::new();
    let mut current_line: Option<(i32, i32, i32)> = None;
    let mut current_words: Vec<OcrWord> = Vec::new();

    for line in tsv.lines().skip(1) {
        // Skip header
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 12 {
            continue;
        }

        // TSV fields: level, page_num, block_num, par_num, line_num, word_num,
        //             left, top, width, height, conf, text
        let level: i32 = fields[0].parse().unwrap_or(-1);
        let block_num: i32 = fields[2].parse().unwrap_or(-1);
        let par_num: i32 = fields[3].parse().unwrap_or(-1);
        let line_num: i32 = fields[4].parse().unwrap_or(-1);
        let conf: f32 = fields[10].parse().unwrap_or(-1.0);
        let text = fields[11].trim();

        // Level 5 = word
        if level != 5 || text.is_empty() || conf < 0.0 {
            continue;
        }

        let key = (block_num, par_num, line_num);
        if current_line.is_some_and(|k| k != key) {
            flush_line(&mut lines, std::mem::take(&mut current_words));
        }
        current_line = Some(key);

        current_words.push(OcrWord {
            text: text.to_string(),
            confidence: conf,
            left: fields[6].parse().unwrap_or(0),
            top: fields[7].parse().unwrap_or(0),
            width: fields[8].parse().unwrap_or(0),
            height: fields[9].parse().unwrap_or(0),
        });
    }

    // Don't forget the last line
    flush_line(&mut lines, current_words);

    lines
}

fn flush_line(lines: &mut Vec<OcrLine>, words: Vec<OcrWord>) {
    if words.is_empty() {
        return;
    }
    let confidence = words.iter().map(|w| w.confidence).sum::<f32>() / words.len() as f32;
    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    lines.push(OcrLine {
        text,
        words,
        confidence,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    fn tsv(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_parse_single_word() {
        let out = tsv(&[
            "1\t1\t0\t0\t0\t0\t0\t0\t60\t90\t-1\t",
            "4\t1\t1\t1\t1\t0\t12\t8\t30\t70\t-1\t",
            "5\t1\t1\t1\t1\t1\t12\t8\t30\t70\t93.5\t8",
        ]);

        let lines = parse_tsv_output(&out);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "8");
        assert_eq!(lines[0].confidence, 93.5);
        let word = &lines[0].words[0];
        assert_eq!((word.left, word.top, word.width, word.height), (12, 8, 30, 70));
    }

    #[test]
    fn test_parse_groups_words_by_line() {
        let out = tsv(&[
            "5\t1\t1\t1\t1\t1\t10\t5\t20\t30\t90\t0",
            "5\t1\t1\t1\t1\t2\t40\t5\t20\t30\t80\t5",
            "5\t1\t1\t1\t2\t1\t10\t50\t20\t30\t70\t2",
        ]);

        let lines = parse_tsv_output(&out);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "0 5");
        assert_eq!(lines[0].confidence, 85.0);
        assert_eq!(lines[1].text, "2");
    }

    #[test]
    fn test_parse_skips_empty_and_negative_confidence() {
        let out = tsv(&[
            "5\t1\t1\t1\t1\t1\t10\t5\t20\t30\t-1\t7",
            "5\t1\t1\t1\t1\t2\t40\t5\t20\t30\t88\t ",
            "short\trow",
        ]);

        assert!(parse_tsv_output(&out).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_hung_process_is_killed_at_limit() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        let started = Instant::now();

        let result = wait_within(&mut child, Some(Duration::from_millis(100)));
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(child.try_wait().unwrap().is_some(), "process reaped");
    }

    #[cfg(unix)]
    #[test]
    fn test_quick_process_status_returned() {
        let mut child = Command::new("true").spawn().unwrap();
        let status = wait_within(&mut child, Some(Duration::from_secs(5))).unwrap();
        assert!(status.success());
    }
}
