use std::io::Write;

use anyhow::Result;
use kbase_lib::types::{AdminFile, AdminReport, AdminUser, UserFile, UserProfile};
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

#[derive(Tabled, Serialize)]
struct UserRow {
    #[tabled(rename = "ID")]
    #[serde(rename = "ID")]
    id: String,
    #[tabled(rename = "Username")]
    #[serde(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    #[serde(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    #[serde(rename = "Role")]
    role: String,
    #[tabled(rename = "Organization")]
    #[serde(rename = "Organization")]
    organization: String,
    #[tabled(rename = "Last Login")]
    #[serde(rename = "Last Login")]
    last_login: String,
}

#[derive(Tabled, Serialize)]
struct FileRow {
    #[tabled(rename = "ID")]
    #[serde(rename = "ID")]
    id: String,
    #[tabled(rename = "Filename")]
    #[serde(rename = "Filename")]
    filename: String,
    #[tabled(rename = "Size")]
    #[serde(rename = "Size")]
    size: String,
    #[tabled(rename = "Uploaded")]
    #[serde(rename = "Uploaded")]
    uploaded_at: String,
    #[tabled(rename = "Uploaded By")]
    #[serde(rename = "Uploaded By")]
    uploaded_by: String,
}

#[derive(Tabled, Serialize)]
struct ReportRow {
    #[tabled(rename = "ID")]
    #[serde(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    #[serde(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    #[serde(rename = "Type")]
    report_type: String,
    #[tabled(rename = "Created")]
    #[serde(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Created By")]
    #[serde(rename = "Created By")]
    created_by: String,
}

#[derive(Tabled, Serialize)]
struct MyFileRow {
    #[tabled(rename = "Filename")]
    #[serde(rename = "Filename")]
    filename: String,
    #[tabled(rename = "Original Name")]
    #[serde(rename = "Original Name")]
    original_filename: String,
    #[tabled(rename = "Size")]
    #[serde(rename = "Size")]
    size: String,
    #[tabled(rename = "Uploaded")]
    #[serde(rename = "Uploaded")]
    uploaded_at: String,
}

#[derive(Tabled, Serialize)]
struct ProfileRow {
    #[tabled(rename = "User ID")]
    #[serde(rename = "User ID")]
    user_id: String,
    #[tabled(rename = "Username")]
    #[serde(rename = "Username")]
    username: String,
    #[tabled(rename = "Email")]
    #[serde(rename = "Email")]
    email: String,
    #[tabled(rename = "Role")]
    #[serde(rename = "Role")]
    role: String,
    #[tabled(rename = "Organization")]
    #[serde(rename = "Organization")]
    organization: String,
}

// -- Row builders --

fn or_dash(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}

fn build_user_rows(users: &[&AdminUser]) -> Vec<UserRow> {
    users
        .iter()
        .map(|u| UserRow {
            id: u.id.clone(),
            username: u.username.clone(),
            email: or_dash(&u.email),
            role: u.role.clone(),
            organization: or_dash(&u.organization_id),
            last_login: or_dash(&u.last_login),
        })
        .collect()
}

fn build_file_rows(files: &[&AdminFile]) -> Vec<FileRow> {
    files
        .iter()
        .map(|f| FileRow {
            id: f.id.clone(),
            filename: f.filename.clone(),
            size: format_size(f.size),
            uploaded_at: or_dash(&f.uploaded_at),
            uploaded_by: or_dash(&f.uploaded_by),
        })
        .collect()
}

fn build_report_rows(reports: &[&AdminReport]) -> Vec<ReportRow> {
    reports
        .iter()
        .map(|r| ReportRow {
            id: r.id.clone(),
            name: r.name.clone(),
            report_type: r.report_type.clone(),
            created_at: or_dash(&r.created_at),
            created_by: or_dash(&r.created_by),
        })
        .collect()
}

fn build_my_file_rows(files: &[&UserFile]) -> Vec<MyFileRow> {
    files
        .iter()
        .map(|f| MyFileRow {
            filename: f.filename.clone(),
            original_filename: or_dash(&f.original_filename),
            size: format_size(f.size),
            uploaded_at: or_dash(&f.uploaded_at),
        })
        .collect()
}

fn build_profile_row(profile: &UserProfile) -> ProfileRow {
    ProfileRow {
        user_id: profile.user_id.clone(),
        username: profile.username.clone(),
        email: or_dash(&profile.email),
        role: profile.role.clone(),
        organization: or_dash(&profile.organization_id),
    }
}

// -- Printers --

fn emit<R, T>(rows: Vec<R>, records: &T, format: &OutputFormat) -> Result<()>
where
    R: Tabled + Serialize,
    T: Serialize + ?Sized,
{
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Json => print_json(records),
        OutputFormat::Csv => write_csv(&rows, std::io::stdout())?,
    }
    Ok(())
}

fn write_csv<R: Serialize, W: Write>(rows: &[R], out: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn print_admin_users(users: &[&AdminUser], format: &OutputFormat) -> Result<()> {
    emit(build_user_rows(users), users, format)
}

pub fn print_admin_files(files: &[&AdminFile], format: &OutputFormat) -> Result<()> {
    emit(build_file_rows(files), files, format)
}

pub fn print_admin_reports(reports: &[&AdminReport], format: &OutputFormat) -> Result<()> {
    emit(build_report_rows(reports), reports, format)
}

pub fn print_user_files(files: &[&UserFile], format: &OutputFormat) -> Result<()> {
    emit(build_my_file_rows(files), files, format)
}

pub fn print_profile(profile: &UserProfile, format: &OutputFormat) -> Result<()> {
    emit(vec![build_profile_row(profile)], profile, format)
}

pub fn print_json<T: Serialize + ?Sized>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_size(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes else {
        return "-".to_string();
    };
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KB * KB * KB {
        format!("{:.1} GB", b / (KB * KB * KB))
    } else if b >= KB * KB {
        format!("{:.1} MB", b / (KB * KB))
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user() -> AdminUser {
        serde_json::from_value(json!({
            "id": "u1",
            "username": "ada",
            "email": "ada@example.com",
            "role": "admin",
            "last_login": "2025-01-02T03:04:05Z"
        }))
        .unwrap()
    }

    fn csv_from_rows<T: Serialize>(rows: &[T]) -> String {
        let mut buf = Vec::new();
        write_csv(rows, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(None), "-");
        assert_eq!(format_size(Some(0)), "0 B");
        assert_eq!(format_size(Some(1023)), "1023 B");
        assert_eq!(format_size(Some(1536)), "1.5 KB");
        assert_eq!(format_size(Some(5 * 1024 * 1024)), "5.0 MB");
        assert_eq!(format_size(Some(3 * 1024 * 1024 * 1024)), "3.0 GB");
    }

    #[test]
    fn test_build_user_rows_mapping() {
        let u = user();
        let rows = build_user_rows(&[&u]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].username, "ada");
        assert_eq!(rows[0].email, "ada@example.com");
        assert_eq!(rows[0].organization, "-");
        assert_eq!(rows[0].last_login, "2025-01-02T03:04:05Z");
    }

    #[test]
    fn test_build_report_rows_uses_type() {
        let r: AdminReport = serde_json::from_value(json!({
            "id": "r1", "name": "Usage", "type": "monthly"
        }))
        .unwrap();
        let rows = build_report_rows(&[&r]);
        assert_eq!(rows[0].report_type, "monthly");
        assert_eq!(rows[0].created_by, "-");
    }

    #[test]
    fn test_build_my_file_rows_empty() {
        assert!(build_my_file_rows(&[]).is_empty());
    }

    #[test]
    fn test_csv_user_headers() {
        let u = user();
        let csv = csv_from_rows(&build_user_rows(&[&u]));
        let header = csv.lines().next().unwrap();
        assert_eq!(header, "ID,Username,Email,Role,Organization,Last Login");
    }

    #[test]
    fn test_csv_file_headers() {
        let f: AdminFile = serde_json::from_value(json!({
            "id": "f1", "filename": "a.pdf", "size": 2048
        }))
        .unwrap();
        let csv = csv_from_rows(&build_file_rows(&[&f]));
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "ID,Filename,Size,Uploaded,Uploaded By");
        assert_eq!(lines.next().unwrap(), "f1,a.pdf,2.0 KB,-,-");
    }

    #[test]
    fn test_profile_row() {
        let p: UserProfile = serde_json::from_value(json!({
            "user_id": "u9", "username": "me", "role": "user", "organization_id": "org"
        }))
        .unwrap();
        let row = build_profile_row(&p);
        assert_eq!(row.user_id, "u9");
        assert_eq!(row.organization, "org");
        assert_eq!(row.email, "-");
    }
}
