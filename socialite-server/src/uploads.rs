use std::{io, path::Path};

use anyhow::Context;
use axum::extract::Multipart;
use tokio::io::AsyncWriteExt;

use crate::Error;

/// Name under which an uploaded file is stored: the upload time, a clash
/// counter when non-zero, then the client-provided name reduced to characters
/// safe in urls and paths
pub fn stored_name(millis: i64, attempt: u32, original: &str) -> String {
    let base = original.rsplit(['/', '\\']).next().unwrap_or_default();
    let mut sanitized = base
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect::<String>();
    if sanitized.trim_matches('.').is_empty() {
        sanitized = String::from("file");
    }
    match attempt {
        0 => format!("{millis}_{sanitized}"),
        n => format!("{millis}-{n}_{sanitized}"),
    }
}

/// Writes `data` under a name no other upload holds, returning that name
async fn write_new(dir: &Path, original: &str, data: &[u8]) -> anyhow::Result<String> {
    let millis = chrono::Utc::now().timestamp_millis();
    let mut attempt = 0;
    loop {
        let name = stored_name(millis, attempt, original);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await;
        match file {
            Ok(mut f) => {
                f.write_all(data)
                    .await
                    .with_context(|| format!("writing uploaded file {name:?}"))?;
                f.flush()
                    .await
                    .with_context(|| format!("flushing uploaded file {name:?}"))?;
                return Ok(name);
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => {
                return Err(e).with_context(|| format!("creating uploaded file {name:?}"));
            }
        }
    }
}

/// Stores every file field of `form` under `dir`, returning their urls
pub async fn store_all(dir: &Path, mut form: Multipart) -> Result<Vec<String>, Error> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating upload directory {dir:?}"))?;
    let mut urls = Vec::new();
    while let Some(field) = form
        .next_field()
        .await
        .map_err(|e| Error::validation(format!("invalid multipart body: {e}")))?
    {
        let Some(original) = field.file_name().map(String::from) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::validation(format!("failed reading uploaded file: {e}")))?;
        let name = write_new(dir, &original, &data).await?;
        tracing::debug!(?name, size = data.len(), "stored uploaded file");
        urls.push(format!("/uploads/{name}"));
    }
    if urls.is_empty() {
        return Err(Error::validation("no file in upload"));
    }
    Ok(urls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_sanitized() {
        assert_eq!(stored_name(42, 0, "cat.png"), "42_cat.png");
        assert_eq!(stored_name(42, 2, "cat.png"), "42-2_cat.png");
        assert_eq!(stored_name(1, 0, "my holiday (1).jpg"), "1_my_holiday__1_.jpg");
        assert_eq!(stored_name(7, 0, "../../etc/passwd"), "7_passwd");
        assert_eq!(stored_name(7, 0, "C:\\Users\\me\\dog.gif"), "7_dog.gif");
        assert_eq!(stored_name(3, 0, ".."), "3_file");
        assert_eq!(stored_name(3, 0, ""), "3_file");
    }

    #[tokio::test]
    async fn same_named_files_do_not_overwrite_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let mut names = Vec::new();
        for i in 0..3u8 {
            names.push(write_new(dir.path(), "cat.png", &[i]).await.unwrap());
        }
        let mut unique = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 3, "{names:?}");
        for (i, name) in names.iter().enumerate() {
            assert!(name.ends_with("_cat.png"), "{name}");
            assert_eq!(std::fs::read(dir.path().join(name)).unwrap(), vec![i as u8]);
        }
    }
}
