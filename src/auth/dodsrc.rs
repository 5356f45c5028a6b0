use crate::auth::CredentialPaths;
use crate::error::Result;

/// `.dodsrc` pointing netCDF/OPeNDAP clients at the cookie jar, client
/// certificate and CA directory.
pub fn dodsrc_contents(paths: &CredentialPaths) -> String {
    [
        format!("HTTP.COOKIEJAR={}", paths.cookie_jar.display()),
        format!("HTTP.SSL.CERTIFICATE={}", paths.pem_file.display()),
        format!("HTTP.SSL.KEY={}", paths.pem_file.display()),
        format!("HTTP.SSL.CAPATH={}", paths.trustroots_dir().display()),
    ]
    .join("\n")
}

pub async fn write_dodsrc(paths: &CredentialPaths) -> Result<()> {
    tokio::fs::write(&paths.dodsrc_file, dodsrc_contents(paths)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_dodsrc_contents() {
        let paths = CredentialPaths::under(Path::new("/home/ana"));
        assert_eq!(
            dodsrc_contents(&paths),
            "HTTP.COOKIEJAR=/home/ana/dods_cookies\n\
             HTTP.SSL.CERTIFICATE=/home/ana/.certs/ceda-dods.pem\n\
             HTTP.SSL.KEY=/home/ana/.certs/ceda-dods.pem\n\
             HTTP.SSL.CAPATH=/home/ana/.certs/ca-trustroots"
        );
    }
}
