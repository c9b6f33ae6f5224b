use std::sync::Arc;

use anyhow::{bail, Result};
use kbase_lib::{UserData, UserDataOptions};

use super::{show_page, Context, ListArgs};
use crate::output::{print_profile, print_user_files};

fn options(ctx: &Context) -> UserDataOptions {
    UserDataOptions::default()
        .with_token(ctx.token.clone())
        .with_timeout(Some(ctx.timeout))
}

pub async fn run_profile(ctx: &Context) -> Result<()> {
    let user = UserData::for_profile(Arc::clone(&ctx.transport), options(ctx));
    if let Some(err) = user.wait_settled().await.error {
        return Err(err.into());
    }
    match user.profile() {
        Some(profile) => print_profile(&profile, &ctx.format),
        None => bail!("no profile in response"),
    }
}

pub async fn run_files(args: &ListArgs, ctx: &Context) -> Result<()> {
    let user = UserData::for_files(
        Arc::clone(&ctx.transport),
        options(ctx).with_filters(args.filter_map()),
    );
    if let Some(err) = user.wait_settled().await.error {
        return Err(err.into());
    }
    let files = user.files();
    show_page(&files, args, "files", |page| print_user_files(page, &ctx.format))
}
