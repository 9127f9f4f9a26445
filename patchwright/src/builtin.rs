//! Patch implementations compiled into the CLI
//!
//! Bundles name these by key in their manifest and configure them through
//! option values.

use patch_bundle::{OptionValues, PatchContext, PatchError, PatchRegistry};

/// Registry holding every built-in implementation
pub fn registry() -> PatchRegistry {
    let mut registry = PatchRegistry::new();
    registry
        .register_patch("resource.put", put_resource)
        .register_patch("resource.remove", remove_resource)
        .register_patch("text.replace", replace_text);
    registry
}

fn required<'a>(options: &'a OptionValues, key: &str) -> Result<&'a str, PatchError> {
    options.get(key).ok_or_else(|| PatchError::InvalidOption {
        key: key.to_string(),
        message: "no value".to_string(),
    })
}

/// Write `content` to resource `path`
fn put_resource(ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError> {
    let path = required(options, "path")?;
    let content = required(options, "content")?;
    ctx.put_resource(path, content.as_bytes().to_vec());
    Ok(())
}

/// Remove resource `path`
fn remove_resource(ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError> {
    let path = required(options, "path")?;
    if !ctx.remove_resource(path) {
        return Err(PatchError::MissingResource(path.to_string()));
    }
    Ok(())
}

/// Replace every `find` with `replace` in text resource `path`
fn replace_text(ctx: &mut dyn PatchContext, options: &OptionValues) -> Result<(), PatchError> {
    let path = required(options, "path")?;
    let find = required(options, "find")?;
    let replace = options.get("replace").unwrap_or_default();

    let data = ctx
        .resource(path)?
        .ok_or_else(|| PatchError::MissingResource(path.to_string()))?;
    let text = String::from_utf8(data)
        .map_err(|_| PatchError::failed(format!("{} is not UTF-8 text", path)))?;
    if !text.contains(find) {
        return Err(PatchError::failed(format!("'{}' not found in {}", find, path)));
    }
    ctx.put_resource(path, text.replace(find, replace).into_bytes());
    Ok(())
}
