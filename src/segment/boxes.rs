use crate::ocr::TextBox;
use crate::ocr::extract::is_digit_token;

/// One digit placed at the centre of its share of a token's box.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PlacedDigit {
    digit: char,
    cx: f32,
    cy: f32,
}

struct Row {
    mean_y: f32,
    digits: Vec<PlacedDigit>,
}

/// Splits digit-only tokens into single digits spread evenly across the box.
fn place_digits(boxes: &[TextBox]) -> Vec<PlacedDigit> {
    let mut placed = Vec::new();
    for b in boxes {
        let text = b.text.trim();
        if !is_digit_token(text) {
            continue;
        }
        let count = text.chars().count() as f32;
        let cy = b.top as f32 + b.height as f32 / 2.0;
        for (i, digit) in text.chars().enumerate() {
            placed.push(PlacedDigit {
                digit,
                cx: b.left as f32 + b.width as f32 * (i as f32 + 0.5) / count,
                cy,
            });
        }
    }
    placed
}

/// Groups digits into rows by centre-y, each joining the first row whose
/// running mean is within `tolerance`. Rows come out top to bottom.
fn group_rows(mut digits: Vec<PlacedDigit>, tolerance: f32) -> Vec<Row> {
    digits.sort_by(|a, b| a.cy.total_cmp(&b.cy).then(a.cx.total_cmp(&b.cx)));

    let mut rows: Vec<Row> = Vec::new();
    for d in digits {
        match rows.iter_mut().find(|r| (d.cy - r.mean_y).abs() <= tolerance) {
            Some(row) => {
                row.digits.push(d);
                let n = row.digits.len() as f32;
                row.mean_y += (d.cy - row.mean_y) / n;
            }
            None => rows.push(Row {
                mean_y: d.cy,
                digits: vec![d],
            }),
        }
    }
    rows
}

/// Orders recognizer boxes into the `n` reading-order digits of a region.
///
/// Uses the row holding the most digits (the upper one on a tie) and keeps
/// its right-most `n` digits. Returns fewer than `n` when that row does not
/// contain enough digits.
pub fn order_digit_boxes(boxes: &[TextBox], n: usize, row_tolerance: f32) -> Vec<char> {
    let rows = group_rows(place_digits(boxes), row_tolerance);

    let chosen = rows
        .iter()
        .reduce(|best, r| if r.digits.len() > best.digits.len() { r } else { best });

    let Some(row) = chosen else {
        return Vec::new();
    };

    let mut digits = row.digits.clone();
    digits.sort_by(|a, b| a.cx.total_cmp(&b.cx));
    let skip = digits.len().saturating_sub(n);
    digits.into_iter().skip(skip).map(|d| d.digit).collect()
}
