use std::io::stdin;

use anyhow::Result;
use palisade_common::helpers::hash::hash_password;

pub(crate) async fn command(password: Option<&str>) -> Result<()> {
    let password = match password {
        Some(password) => password.to_owned(),
        None => {
            let mut input = String::new();
            stdin().read_line(&mut input)?;
            input.trim_end_matches(['\r', '\n']).to_owned()
        }
    };

    println!("{}", hash_password(&password)?);
    Ok(())
}
