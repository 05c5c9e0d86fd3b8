pub mod engine;
pub mod extract;
pub mod http;
pub mod preprocess;
pub mod recognizer;
pub mod setup;

pub use engine::{OcrLine, OcrWord, TesseractRecognizer};
pub use http::HttpRecognizer;
pub use preprocess::{Polarity, PreprocessConfig, preprocess};
pub use recognizer::{
    Glyph, OcrText, Recognition, Recognizer, TextBox, read_glyph, recognize_boxes_within, recognize_text_within,
};
