//! Tomcat manager HTML → [`TomcatSnapshot`].
//!
//! Only two tables matter: the one titled "Applications" (mandatory) and the
//! one titled "Server Information" (optional; missing values become `None`).

use std::collections::{HashMap, HashSet};

use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::{TomcatSnapshot, WebApp};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

pub fn parse_snapshot(html: &str) -> Result<TomcatSnapshot, ParseError> {
    let doc = Html::parse_document(html);

    let apps_table = titled_table(&doc, "Applications")?
        .ok_or_else(|| ParseError("Tomcat manager HTML: missing Applications table".into()))?;

    let links = selector("td.row-left[rowspan] > small > a[href]")?;
    let mut seen = HashSet::new();
    let mut webapps = Vec::new();

    for link in apps_table.select(&links) {
        let path = element_text(link);
        if path.is_empty() {
            continue;
        }
        let (version_cell, display_cell) = sibling_cells(link);

        let mut version = version_cell
            .map(element_text)
            .filter(|v| !v.is_empty() && !v.to_lowercase().contains("none specified"));
        let display = display_cell
            .map(element_text)
            .and_then(|d| d.split(' ').next().map(str::to_string))
            .unwrap_or_default();

        let mut name = default_name(&path);
        if !display.is_empty() && Some(&display) != version.as_ref() {
            name = display;
        }
        if version.is_none() {
            if let Some((base, tag)) = name.split_once("##") {
                version = Some(tag.to_string());
                name = base.to_string();
            }
        }

        let app = WebApp { path, name, version };
        if seen.insert(app.clone()) {
            webapps.push(app);
        }
    }

    if webapps.is_empty() {
        return Err(ParseError(
            "Tomcat manager HTML: Applications table contained no paths".into(),
        ));
    }
    webapps.sort_by_key(|w| w.path.to_lowercase());

    let info = server_info(&doc)?;
    let os = ["OS Name", "OS Version", "OS Architecture"]
        .iter()
        .filter_map(|k| info.get(*k))
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");

    Ok(TomcatSnapshot {
        webapps,
        tomcat_version: info.get("Tomcat Version").cloned(),
        java_version: info.get("JVM Version").cloned(),
        os: (!os.is_empty()).then_some(os),
    })
}

/// The version cell and display-name cell that follow the path cell of
/// `link` within its row.
fn sibling_cells(link: ElementRef<'_>) -> (Option<ElementRef<'_>>, Option<ElementRef<'_>>) {
    let Some(cell) = closest(link, "td") else {
        return (None, None);
    };
    let Some(row) = closest(cell, "tr") else {
        return (None, None);
    };
    let cells: Vec<ElementRef<'_>> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|e| e.value().name() == "td")
        .collect();
    let Some(idx) = cells.iter().position(|c| c.id() == cell.id()) else {
        return (None, None);
    };
    (cells.get(idx + 1).copied(), cells.get(idx + 2).copied())
}

/// Header/value pairs of the "Server Information" table. Blank keys or
/// values are dropped.
fn server_info(doc: &Html) -> Result<HashMap<String, String>, ParseError> {
    let mut info = HashMap::new();
    let Some(table) = titled_table(doc, "Server Information")? else {
        return Ok(info);
    };

    let rows = selector("tr")?;
    let header_cells = selector("td.header-center, td.header-left")?;
    let cells = selector("td")?;

    let Some(header_row) = table.select(&rows).find(|r| r.select(&header_cells).next().is_some())
    else {
        return Ok(info);
    };
    let Some(value_row) = header_row.next_siblings().find_map(ElementRef::wrap) else {
        return Ok(info);
    };

    for (k, v) in header_row.select(&cells).zip(value_row.select(&cells)) {
        let (k, v) = (element_text(k), element_text(v));
        if !k.is_empty() && !v.is_empty() {
            info.insert(k, v);
        }
    }
    Ok(info)
}

/// The `<table>` enclosing the first `td.title` whose text contains `title`,
/// ignoring case.
fn titled_table<'a>(doc: &'a Html, title: &str) -> Result<Option<ElementRef<'a>>, ParseError> {
    let titles = selector("td.title")?;
    let wanted = title.to_lowercase();
    Ok(doc
        .select(&titles)
        .find(|td| td.text().collect::<String>().to_lowercase().contains(&wanted))
        .and_then(|td| closest(td, "table")))
}

fn closest<'a>(el: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == tag)
}

/// Text content with runs of whitespace collapsed and non-breaking spaces
/// removed.
fn element_text(el: ElementRef<'_>) -> String {
    let raw: String = el.text().collect();
    raw.replace('\u{a0}', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn default_name(path: &str) -> String {
    match path {
        "/" => "ROOT".to_string(),
        p => p.strip_prefix('/').unwrap_or(p).to_string(),
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError(format!("invalid selector {css:?}: {e:?}")))
}
