use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;

use crate::types::{Organization, Report, SearchResult, Value};

/// Labels expected on a report detail page, in page order. A page label that
/// does not match its slot leaves that field absent.
const REPORT_LABELS: [&str; 3] = ["Publication year:", "Report type:", "Adherence Level:"];

/// Number of value nodes an organization detail page must render.
const ORG_FIELD_COUNT: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to decode search payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing required field: {0}")]
    MissingField(String),
    #[error("Failed to parse URL: {0}")]
    UrlParse(String),
    #[error("Unexpected field count: expected {expected}, found {found}")]
    FieldCount { expected: usize, found: usize },
}

#[derive(Deserialize)]
struct SearchPayload {
    dt: DataTable,
}

#[derive(Deserialize)]
struct DataTable {
    data: Vec<[String; 6]>,
}

fn elem_text(element: ElementRef) -> String {
    element.text().collect::<String>()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Last non-empty path segment of an href, ignoring a trailing slash.
fn path_id(href: &str) -> Result<String, ParseError> {
    href.trim_end_matches('/')
        .split('/')
        .next_back()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParseError::UrlParse(format!("No id segment in href: {}", href)))
}

/// Parses one search-results page: a JSON document whose `dt.data` rows are
/// 6-tuples of (org_name_html, size, sector, country_html, region,
/// reports_html). Malformed rows are logged and dropped; the page survives.
pub fn parse_search_page(body: &str) -> Result<Vec<SearchResult>, ParseError> {
    let payload: SearchPayload = serde_json::from_str(body)?;

    let mut results = Vec::new();
    for row in &payload.dt.data {
        match parse_search_row(row) {
            Ok(result) => results.push(result),
            Err(e) => log::warn!("Skipping malformed search row: {}", e),
        }
    }
    Ok(results)
}

fn parse_search_row(row: &[String; 6]) -> Result<SearchResult, ParseError> {
    let [org_name_html, size, sector, country_html, region, reports_html] = row;

    let anchor_sel = Selector::parse("a").unwrap();
    let img_sel = Selector::parse("img").unwrap();

    let name_fragment = Html::parse_fragment(org_name_html);
    let anchor = name_fragment
        .select(&anchor_sel)
        .next()
        .ok_or_else(|| ParseError::MissingField("organization anchor".to_string()))?;
    let org_name = elem_text(anchor).trim().to_string();
    let href = anchor
        .value()
        .attr("href")
        .ok_or_else(|| ParseError::MissingField("organization href".to_string()))?;
    let org_id = path_id(href)?;

    let country_fragment = Html::parse_fragment(country_html);
    let flag_src = country_fragment
        .select(&img_sel)
        .next()
        .and_then(|img| img.value().attr("src"))
        .ok_or_else(|| ParseError::MissingField("country flag image".to_string()))?;
    // flag filename without extension is the country code, e.g. /flags/de.png
    let country = flag_src
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ParseError::UrlParse(format!("No country code in src: {}", flag_src)))?;

    let reports_fragment = Html::parse_fragment(reports_html);
    let reports = reports_fragment
        .select(&anchor_sel)
        .filter_map(|a| a.value().attr("href"))
        .map(path_id)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SearchResult {
        org_name,
        org_id,
        size: size.clone(),
        sector: sector.clone(),
        country,
        region: region.clone(),
        reports,
    })
}

/// First direct text child of a node, trimmed. Whitespace-only → `None`.
fn direct_text(element: ElementRef) -> Option<String> {
    element.children().find_map(|child| match child.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        _ => None,
    })
}

/// Parses an organization detail page. The page renders one value node per
/// `li.list-group-item` (its second non-image child element); exactly
/// [`ORG_FIELD_COUNT`] such nodes are required, assigned in the fixed field
/// order. Any other count is a layout mismatch and fails the whole page
/// rather than misassigning fields.
pub fn parse_organization(html: &str, org_id: &str) -> Result<Organization, ParseError> {
    let document = Html::parse_document(html);

    let name_sel = Selector::parse("h1.card-title").unwrap();
    let org_name = document
        .select(&name_sel)
        .next()
        .map(|e| elem_text(e).trim().to_string())
        .filter(|s| !s.is_empty());

    let item_sel = Selector::parse("li.list-group-item").unwrap();
    let mut values = Vec::new();
    for item in document.select(&item_sel) {
        let second_child = item
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() != "img")
            .nth(1);
        if let Some(node) = second_child {
            values.push(direct_text(node));
        }
    }

    if values.len() != ORG_FIELD_COUNT {
        return Err(ParseError::FieldCount {
            expected: ORG_FIELD_COUNT,
            found: values.len(),
        });
    }

    let mut values = values.into_iter();
    Ok(Organization {
        org_id: org_id.to_string(),
        org_name,
        size: values.next().flatten(),
        org_type: values.next().flatten(),
        listed: values.next().flatten(),
        sector: values.next().flatten(),
        country: values.next().flatten(),
        country_status: values.next().flatten(),
        employees: values.next().flatten(),
        revenue: values.next().flatten(),
        community: values.next().flatten(),
        stock: values.next().flatten(),
    })
}

/// Parses a report detail page. The `<h1>` is the report name; label nodes
/// are matched positionally against [`REPORT_LABELS`], a mismatched label
/// leaving that field absent.
pub fn parse_report(html: &str, report_id: &str) -> Result<Report, ParseError> {
    let document = Html::parse_document(html);

    let name_sel = Selector::parse("h1").unwrap();
    let report_name = document
        .select(&name_sel)
        .next()
        .map(|e| normalize_whitespace(&elem_text(e)))
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ParseError::MissingField("report name".to_string()))?;

    let label_sel = Selector::parse("li.list-group-item span.text-slim").unwrap();
    let labels: Vec<ElementRef> = document.select(&label_sel).collect();

    let mut fields: [Option<Value>; 3] = [None, None, None];
    for (i, expected) in REPORT_LABELS.iter().enumerate() {
        let Some(label) = labels.get(i) else {
            continue;
        };
        let text = normalize_whitespace(&elem_text(*label));
        if text == *expected {
            fields[i] = sibling_value(*label);
        } else {
            log::debug!("Report {}: label '{}' != '{}'", report_id, text, expected);
        }
    }
    let [pub_year, report_type, adherence] = fields;

    Ok(Report {
        report_id: report_id.to_string(),
        report_name,
        pub_year,
        report_type,
        adherence,
    })
}

/// Extracts the value following a label node. Whitespace-only text siblings
/// are skipped; the first non-empty text node is taken verbatim, while the
/// first element sibling ends the scan: an ok/remove icon class becomes a
/// boolean, anything else contributes its own text. No value → `None`.
fn sibling_value(label: ElementRef) -> Option<Value> {
    for sibling in label.next_siblings() {
        match sibling.value() {
            Node::Text(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return Some(Value::Text(trimmed.to_string()));
                }
            }
            Node::Element(_) => {
                let element = ElementRef::wrap(sibling)?;
                let class = element
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .find_map(|e| e.value().attr("class"))
                    .unwrap_or("");
                if class.contains("glyphicon-ok") {
                    return Some(Value::Flag(true));
                }
                if class.contains("glyphicon-remove") {
                    return Some(Value::Flag(false));
                }
                let text = elem_text(element);
                let text = text.trim();
                return (!text.is_empty()).then(|| Value::Text(text.to_string()));
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_PAGE: &str = r#"{
      "dt": {
        "draw": 1,
        "recordsTotal": 42,
        "data": [
          [
            "<a href=\"/organizations/8841/\"> Acme Holding </a>",
            "Large",
            "Energy",
            "<img src=\"/static/img/flags/de.png\">",
            "Europe",
            "<a href=\"/reports/51129/\">SR 2018</a> <a href=\"/reports/48210/\">SR 2017</a>"
          ],
          [
            "<a href=\"/organizations/9023/\">Blue Water SA</a>",
            "SME",
            "Water Utilities",
            "<img src=\"/static/img/flags/cl.png\">",
            "Latin America",
            ""
          ]
        ]
      }
    }"#;

    #[test]
    fn test_parse_search_page() {
        let results = parse_search_page(SEARCH_PAGE).expect("Failed to parse search page");
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.org_name, "Acme Holding");
        assert_eq!(first.org_id, "8841");
        assert_eq!(first.size, "Large");
        assert_eq!(first.sector, "Energy");
        assert_eq!(first.country, "de");
        assert_eq!(first.region, "Europe");
        assert_eq!(first.reports, ["51129", "48210"]);

        let second = &results[1];
        assert_eq!(second.country, "cl");
        assert!(second.reports.is_empty(), "No report anchors means no ids");
    }

    #[test]
    fn test_parse_search_page_skips_malformed_row() {
        let body = r#"{"dt": {"data": [
          ["no anchor here", "Large", "Energy", "<img src=\"/flags/de.png\">", "Europe", ""],
          ["<a href=\"/organizations/77/\">Ok Org</a>", "SME", "Mining", "<img src=\"/flags/za.png\">", "Africa", ""]
        ]}}"#;

        let results = parse_search_page(body).expect("Page should survive a bad row");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].org_id, "77");
    }

    #[test]
    fn test_parse_search_page_bad_json() {
        assert!(matches!(
            parse_search_page("<html>blocked</html>"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_path_id_skips_trailing_slash() {
        assert_eq!(path_id("/organizations/8841/").unwrap(), "8841");
        assert_eq!(path_id("/reports/51129").unwrap(), "51129");
        assert!(path_id("///").is_err());
    }

    fn org_item(label: &str, value: &str) -> String {
        format!(
            "<li class=\"list-group-item\"><span>{}</span><span>{}</span></li>",
            label, value
        )
    }

    fn org_page(items: &[String]) -> String {
        format!(
            "<html><body><h1 class=\"card-title\">Acme Holding</h1><ul>{}</ul></body></html>",
            items.join("")
        )
    }

    fn ten_org_items() -> Vec<String> {
        vec![
            org_item("Size", "Large"),
            org_item("Type", "Private company"),
            org_item("Listed", "Non-listed"),
            org_item("Sector", "Energy"),
            // flag icon before the label must not shift the value slot
            "<li class=\"list-group-item\"><img src=\"/flags/de.png\"><span>Country</span><span>Germany</span></li>"
                .to_string(),
            org_item("Country status", "OECD"),
            org_item("Employees", "Not provided"),
            org_item("Revenue", "Not provided"),
            org_item("Community", "GOLD Community"),
            "<li class=\"list-group-item\"><span>Stock</span><span></span></li>".to_string(),
        ]
    }

    #[test]
    fn test_parse_organization() {
        let html = org_page(&ten_org_items());
        let org = parse_organization(&html, "8841").expect("Failed to parse organization");

        assert_eq!(org.org_id, "8841");
        assert_eq!(org.org_name.as_deref(), Some("Acme Holding"));
        assert_eq!(org.size.as_deref(), Some("Large"));
        assert_eq!(org.org_type.as_deref(), Some("Private company"));
        assert_eq!(org.listed.as_deref(), Some("Non-listed"));
        assert_eq!(org.sector.as_deref(), Some("Energy"));
        assert_eq!(org.country.as_deref(), Some("Germany"));
        assert_eq!(org.country_status.as_deref(), Some("OECD"));
        assert_eq!(org.employees.as_deref(), Some("Not provided"));
        assert_eq!(org.community.as_deref(), Some("GOLD Community"));
        assert_eq!(org.stock, None, "Empty value node reads as absent");
    }

    #[test]
    fn test_parse_organization_layout_mismatch() {
        let mut items = ten_org_items();
        items.pop();
        let html = org_page(&items);

        match parse_organization(&html, "8841") {
            Err(ParseError::FieldCount { expected, found }) => {
                assert_eq!(expected, 10);
                assert_eq!(found, 9);
            }
            other => panic!("Expected FieldCount error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_organization_without_title() {
        let html = format!("<html><body><ul>{}</ul></body></html>", ten_org_items().join(""));
        let org = parse_organization(&html, "8841").expect("Failed to parse organization");
        assert_eq!(org.org_name, None);
    }

    const REPORT_PAGE: &str = r#"<html><body>
      <h1>Acme Sustainability Report 2018</h1>
      <ul>
        <li class="list-group-item"><span class="text-slim">Publication year:</span> 2018</li>
        <li class="list-group-item"><span class="text-slim">Report type:</span> <span>GRI - G4</span></li>
        <li class="list-group-item"><span class="text-slim">Adherence Level:</span> <span class="glyphicon glyphicon-ok"></span></li>
      </ul>
    </body></html>"#;

    #[test]
    fn test_parse_report() {
        let report = parse_report(REPORT_PAGE, "51129").expect("Failed to parse report");

        assert_eq!(report.report_id, "51129");
        assert_eq!(report.report_name, "Acme Sustainability Report 2018");
        assert_eq!(report.pub_year, Some(Value::Text("2018".to_string())));
        assert_eq!(report.report_type, Some(Value::Text("GRI - G4".to_string())));
        assert_eq!(report.adherence, Some(Value::Flag(true)));
    }

    #[test]
    fn test_parse_report_label_mismatch_leaves_field_absent() {
        let html = r#"<html><body>
          <h1>Report</h1>
          <ul>
            <li class="list-group-item"><span class="text-slim">Publication year:</span> 2019</li>
            <li class="list-group-item"><span class="text-slim">Type:</span> <span>Citing</span></li>
            <li class="list-group-item"><span class="text-slim">Adherence Level:</span> In accordance - Core</li>
          </ul>
        </body></html>"#;

        let report = parse_report(html, "7").expect("Failed to parse report");
        assert_eq!(report.pub_year, Some(Value::Text("2019".to_string())));
        assert_eq!(report.report_type, None, "Mismatched label yields no value");
        assert_eq!(
            report.adherence,
            Some(Value::Text("In accordance - Core".to_string()))
        );
    }

    #[test]
    fn test_parse_report_remove_icon_is_false() {
        let html = r#"<html><body>
          <h1>Report</h1>
          <ul>
            <li class="list-group-item"><span class="text-slim">Publication year:</span> <span class="glyphicon glyphicon-remove"></span></li>
          </ul>
        </body></html>"#;

        let report = parse_report(html, "7").expect("Failed to parse report");
        assert_eq!(report.pub_year, Some(Value::Flag(false)));
    }

    #[test]
    fn test_parse_report_missing_value_sibling() {
        let html = r#"<html><body>
          <h1>Report</h1>
          <ul>
            <li class="list-group-item"><span class="text-slim">Publication year:</span></li>
          </ul>
        </body></html>"#;

        let report = parse_report(html, "7").expect("Failed to parse report");
        assert_eq!(report.pub_year, None);
    }

    #[test]
    fn test_parse_report_missing_name() {
        let html = "<html><body><p>nothing here</p></body></html>";
        assert!(matches!(
            parse_report(html, "7"),
            Err(ParseError::MissingField(_))
        ));
    }
}
