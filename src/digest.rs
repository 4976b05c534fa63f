//! HTML digest of a run's postings.

use chrono::NaiveDateTime;

use crate::types::{Failure, JobPosting};

const STYLE: &str = "body{font-family:Arial,Helvetica,sans-serif;color:#222}\
table{border-collapse:collapse;margin:8px 0 20px}\
th,td{border:1px solid #ccc;padding:6px 8px;text-align:left;font-size:14px}\
th{background:#f0f4f8}h2{font-size:18px;margin:18px 0 6px}\
.meta{color:#666;font-size:13px}.failures li{color:#a33}";

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn jobs_table(out: &mut String, jobs: &[JobPosting]) {
    out.push_str("<table><tr><th>Hospital</th><th>Title</th><th>Location</th><th>Posted</th><th>Type</th></tr>");
    for job in jobs {
        let posted = job.date_posted.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        out.push_str(&format!(
            "<tr><td>{}</td><td><a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{}</td></tr>",
            escape_html(&job.hospital),
            escape_html(&job.url),
            escape_html(&job.job_title),
            escape_html(job.location.as_deref().unwrap_or("")),
            escape_html(&posted),
            escape_html(&job.job_type),
        ));
    }
    out.push_str("</table>");
}

/// Render the digest. Returns `(subject, html)`.
///
/// `all_jobs` adds a second table with every matching posting, `failures`
/// adds a list of sources that could not be scraped.
pub fn render_jobs_email(
    subject_title: &str,
    run_at: NaiveDateTime,
    new_jobs: &[JobPosting],
    all_jobs: Option<&[JobPosting]>,
    failures: Option<&[Failure]>,
) -> (String, String) {
    let mut html = String::new();
    html.push_str(&format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><style>{}</style></head><body>",
        STYLE
    ));
    html.push_str(&format!("<h1>{}</h1>", escape_html(subject_title)));
    html.push_str(&format!("<p class=\"meta\">Run at {}</p>", run_at.format("%Y-%m-%d %H:%M")));

    html.push_str(&format!("<h2>New postings ({})</h2>", new_jobs.len()));
    if new_jobs.is_empty() {
        html.push_str("<p>No matching postings found today.</p>");
    } else {
        jobs_table(&mut html, new_jobs);
    }

    if let Some(all) = all_jobs {
        html.push_str(&format!("<h2>All matching postings ({})</h2>", all.len()));
        jobs_table(&mut html, all);
    }

    if let Some(failures) = failures.filter(|f| !f.is_empty()) {
        html.push_str("<h2>Source failures</h2><ul class=\"failures\">");
        for failure in failures {
            html.push_str(&format!(
                "<li><strong>{}</strong>: {}</li>",
                escape_html(&failure.hospital),
                escape_html(&failure.error)
            ));
        }
        html.push_str("</ul>");
    }

    html.push_str("</body></html>");
    (subject_title.to_string(), html)
}
