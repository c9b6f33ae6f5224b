use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use kbase_lib::{AdminCollection, AdminData, AdminDataOptions, AdminResource};

use super::{show_page, Context, ListArgs};
use crate::output::{print_admin_files, print_admin_reports, print_admin_users};

#[derive(Args, Debug)]
pub struct AdminArgs {
    #[command(flatten)]
    pub list: ListArgs,

    /// Refresh every SECS seconds until interrupted. Intervals under 60
    /// seconds bypass the response cache
    #[arg(long, value_name = "SECS")]
    pub watch: Option<u64>,
}

pub async fn run(resource: AdminResource, args: &AdminArgs, ctx: &Context) -> Result<()> {
    let options = AdminDataOptions::default()
        .with_token(ctx.token.clone())
        .with_timeout(Some(ctx.timeout))
        .with_filters(args.list.filter_map())
        .with_auto_refresh(args.watch.map(Duration::from_secs));
    let admin = AdminData::new(Arc::clone(&ctx.transport), Some(resource), options);

    let state = admin.wait_settled().await;
    if let Some(err) = state.error {
        if args.watch.is_none() {
            return Err(err.into());
        }
        eprintln!("{}", err);
    } else {
        render(&admin, &args.list, ctx)?;
    }

    if args.watch.is_none() {
        return Ok(());
    }

    let mut updates = admin.subscribe();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.loading {
                    continue;
                }
                match state.error {
                    Some(err) => eprintln!("{}", err),
                    None => render(&admin, &args.list, ctx)?,
                }
            }
        }
    }
    Ok(())
}

fn render(admin: &AdminData, list: &ListArgs, ctx: &Context) -> Result<()> {
    match admin.data() {
        AdminCollection::Users(users) => {
            show_page(&users, list, "users", |page| print_admin_users(page, &ctx.format))
        }
        AdminCollection::Files(files) => {
            show_page(&files, list, "files", |page| print_admin_files(page, &ctx.format))
        }
        AdminCollection::Reports(reports) => {
            show_page(&reports, list, "reports", |page| print_admin_reports(page, &ctx.format))
        }
        AdminCollection::Unselected => Ok(()),
    }
}
