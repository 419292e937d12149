//! Gallery Index
//! Static HTML page listing a run's artifacts in generation order.

use crate::generator::GenerationReport;
use std::fs;
use std::io;
use std::path::PathBuf;

pub const GALLERY_FILE: &str = "index.html";

/// Write `index.html` into the report's output directory.
pub fn write_gallery(report: &GenerationReport) -> io::Result<PathBuf> {
    let path = report.output_dir.join(GALLERY_FILE);
    fs::write(&path, render_page(report))?;
    Ok(path)
}

fn render_page(report: &GenerationReport) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>Chart gallery</title>\n<style>\n\
         body { font-family: sans-serif; margin: 2rem; background: #fafafa; }\n\
         figure { display: inline-block; margin: 1rem; padding: 0.5rem; background: #fff; \
         box-shadow: 0 1px 3px rgba(0,0,0,0.2); }\n\
         img { max-width: 480px; display: block; }\n\
         figcaption { text-align: center; margin-top: 0.5rem; }\n\
         .failures { color: #c0392b; }\n\
         </style>\n</head>\n<body>\n<h1>Chart gallery</h1>\n",
    );

    for artifact in &report.artifacts {
        let file = artifact
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let title = escape_html(&artifact.title);
        html.push_str(&format!(
            "<figure>\n<img src=\"{}\" alt=\"{title}\">\n<figcaption>{title}</figcaption>\n</figure>\n",
            escape_html(&file)
        ));
    }

    if !report.failures.is_empty() {
        html.push_str("<h2 class=\"failures\">Not generated</h2>\n<ul class=\"failures\">\n");
        for failure in &report.failures {
            html.push_str(&format!(
                "<li>{}: {}</li>\n",
                escape_html(&failure.file_stem),
                escape_html(&failure.error)
            ));
        }
        html.push_str("</ul>\n");
    }

    html.push_str("</body>\n</html>\n");
    html
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::ChartKind;
    use crate::generator::{Artifact, ChartFailure};

    fn report(dir: PathBuf) -> GenerationReport {
        GenerationReport {
            artifacts: vec![
                Artifact {
                    kind: ChartKind::Histogram,
                    title: "Histogram of a<b".to_string(),
                    path: dir.join("histogram_a_b.png"),
                },
                Artifact {
                    kind: ChartKind::Pie,
                    title: "Pie Chart of city".to_string(),
                    path: dir.join("pie_chart_city.png"),
                },
            ],
            failures: vec![ChartFailure {
                kind: ChartKind::Bar,
                file_stem: "bar_chart_x".to_string(),
                columns: vec!["x".to_string()],
                error: "Column 'x' has no values to plot".to_string(),
            }],
            output_dir: dir,
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<a href="x">&'"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;"
        );
    }

    #[test]
    fn figures_follow_generation_order() {
        let page = render_page(&report(PathBuf::from("/tmp/run")));
        let first = page.find("histogram_a_b.png").unwrap();
        let second = page.find("pie_chart_city.png").unwrap();
        assert!(first < second);
        assert!(page.contains("Histogram of a&lt;b"));
        assert!(page.contains("bar_chart_x"));
        assert_eq!(page.matches("<figure>").count(), 2);
        assert!(page.contains("<li>bar_chart_x: Column &#39;x&#39; has no values to plot</li>\n"));
    }

    #[test]
    fn writes_index_next_to_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_gallery(&report(dir.path().to_path_buf())).unwrap();
        assert_eq!(path, dir.path().join(GALLERY_FILE));
        assert!(fs::read_to_string(path).unwrap().contains("<figure>"));
    }
}
