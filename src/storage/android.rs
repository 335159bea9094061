//! `ContentResolver` / `DocumentsContract` backed [`DocumentProvider`].

use std::os::fd::{FromRawFd, OwnedFd};

use jni::objects::{GlobalRef, JObject, JString, JValue};
use jni::JNIEnv;
use tracing::debug;

use super::locator::{Regime, ResourceLocator};
use super::provider::{DocumentProvider, OpenMode};
use crate::android::{app_context, attach, clear_exception};
use crate::error::StorageError;

const COLUMN_LAST_MODIFIED: &str = "last_modified";
const COLUMN_DATE_MODIFIED: &str = "date_modified";

pub struct ContentResolverProvider {
    resolver: GlobalRef,
}

impl ContentResolverProvider {
    /// Provider over the application context's `ContentResolver`.
    pub fn from_app_context() -> Result<Self, StorageError> {
        let mut env = attach().map_err(|e| jni_failure("attach", e))?;
        let result = (|| -> jni::errors::Result<GlobalRef> {
            let context = app_context()?;
            let resolver = env
                .call_method(
                    context.as_obj(),
                    "getContentResolver",
                    "()Landroid/content/ContentResolver;",
                    &[],
                )?
                .l()?;
            env.new_global_ref(resolver)
        })();
        match result {
            Ok(resolver) => Ok(Self { resolver }),
            Err(e) => {
                clear_exception(&mut env);
                Err(jni_failure("getContentResolver", e))
            }
        }
    }

    /// Run `f` with an attached env, clearing any Java exception it leaves.
    fn with_env<T>(
        &self,
        what: &str,
        f: impl FnOnce(&mut JNIEnv<'static>, &JObject) -> jni::errors::Result<T>,
    ) -> Result<T, String> {
        let mut env = attach().map_err(|e| format!("attach: {}", e))?;
        let result = f(&mut env, self.resolver.as_obj());
        result.map_err(|e| {
            clear_exception(&mut env);
            format!("{}: {}", what, e)
        })
    }

    fn query_column(
        env: &mut JNIEnv<'static>,
        resolver: &JObject,
        locator: &ResourceLocator,
        column: Option<&str>,
    ) -> jni::errors::Result<Option<Option<i64>>> {
        let uri = parse_uri(env, locator)?;
        let cursor = env
            .call_method(
                resolver,
                "query",
                "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;",
                &[
                    JValue::Object(&uri),
                    JValue::Object(&JObject::null()),
                    JValue::Object(&JObject::null()),
                    JValue::Object(&JObject::null()),
                    JValue::Object(&JObject::null()),
                ],
            )?
            .l()?;
        if cursor.is_null() {
            return Ok(None);
        }

        let value = Self::read_first_row(env, &cursor, column);
        // the cursor is closed on every path; close itself needs a clear
        // exception state
        if value.is_err() {
            clear_exception(env);
        }
        let closed = env.call_method(&cursor, "close", "()V", &[]);
        let value = value?;
        closed?;
        Ok(value)
    }

    fn read_first_row(
        env: &mut JNIEnv<'static>,
        cursor: &JObject,
        column: Option<&str>,
    ) -> jni::errors::Result<Option<Option<i64>>> {
        if !env.call_method(cursor, "moveToFirst", "()Z", &[])?.z()? {
            return Ok(None);
        }
        match column {
            Some(column) => Ok(Some(Self::read_long(env, cursor, column)?)),
            None => Ok(Some(None)),
        }
    }

    fn read_long(
        env: &mut JNIEnv<'static>,
        cursor: &JObject,
        column: &str,
    ) -> jni::errors::Result<Option<i64>> {
        let name = env.new_string(column)?;
        let index = env
            .call_method(
                cursor,
                "getColumnIndex",
                "(Ljava/lang/String;)I",
                &[JValue::Object(&name)],
            )?
            .i()?;
        if index < 0 {
            return Ok(None);
        }
        let null = env
            .call_method(cursor, "isNull", "(I)Z", &[JValue::Int(index)])?
            .z()?;
        if null {
            return Ok(None);
        }
        let value = env
            .call_method(cursor, "getLong", "(I)J", &[JValue::Int(index)])?
            .j()?;
        Ok(Some(value))
    }
}

impl DocumentProvider for ContentResolverProvider {
    fn query_exists(&self, locator: &ResourceLocator) -> Result<bool, StorageError> {
        let row = self
            .with_env("query", |env, resolver| {
                Self::query_column(env, resolver, locator, None)
            })
            .map_err(|reason| StorageError::permission(locator, reason))?;
        Ok(row.is_some())
    }

    fn query_last_modified(&self, locator: &ResourceLocator) -> Result<Option<i64>, StorageError> {
        // tree documents report milliseconds, media rows seconds
        let (column, scale) = match locator.regime() {
            Regime::PermissionedTree => (COLUMN_LAST_MODIFIED, 1),
            _ => (COLUMN_DATE_MODIFIED, 1000),
        };
        let row = self
            .with_env("query", |env, resolver| {
                Self::query_column(env, resolver, locator, Some(column))
            })
            .map_err(|reason| StorageError::permission(locator, reason))?;
        Ok(row.flatten().map(|value| value * scale))
    }

    fn create_document(
        &self,
        parent: &ResourceLocator,
        mime_type: &str,
        name: &str,
    ) -> Result<ResourceLocator, StorageError> {
        let created = self
            .with_env("createDocument", |env, resolver| {
                let uri = parse_uri(env, parent)?;
                let mime = env.new_string(mime_type)?;
                let display_name = env.new_string(name)?;
                let created = env
                    .call_static_method(
                        "android/provider/DocumentsContract",
                        "createDocument",
                        "(Landroid/content/ContentResolver;Landroid/net/Uri;Ljava/lang/String;Ljava/lang/String;)Landroid/net/Uri;",
                        &[
                            JValue::Object(resolver),
                            JValue::Object(&uri),
                            JValue::Object(&mime),
                            JValue::Object(&display_name),
                        ],
                    )?
                    .l()?;
                if created.is_null() {
                    return Ok(None);
                }
                let text: JString = env
                    .call_method(&created, "toString", "()Ljava/lang/String;", &[])?
                    .l()?
                    .into();
                let text: String = env.get_string(&text)?.into();
                Ok(Some(text))
            })
            .map_err(|reason| StorageError::io(parent, reason))?;

        let created = created
            .ok_or_else(|| StorageError::io(parent, format!("provider refused to create '{}'", name)))?;
        debug!(parent = %parent, created = %created, "document created");
        ResourceLocator::parse(&created)
            .ok_or_else(|| StorageError::io(parent, format!("provider returned unparseable URI {}", created)))
    }

    fn delete_document(&self, locator: &ResourceLocator) -> Result<(), StorageError> {
        let deleted = self
            .with_env("deleteDocument", |env, resolver| {
                let uri = parse_uri(env, locator)?;
                env.call_static_method(
                    "android/provider/DocumentsContract",
                    "deleteDocument",
                    "(Landroid/content/ContentResolver;Landroid/net/Uri;)Z",
                    &[JValue::Object(resolver), JValue::Object(&uri)],
                )?
                .z()
            })
            .map_err(|reason| StorageError::io(locator, reason))?;
        if deleted {
            Ok(())
        } else {
            Err(StorageError::io(locator, "provider refused to delete"))
        }
    }

    fn open_descriptor(
        &self,
        locator: &ResourceLocator,
        mode: OpenMode,
    ) -> Result<OwnedFd, StorageError> {
        let fd = self
            .with_env("openFileDescriptor", |env, resolver| {
                let uri = parse_uri(env, locator)?;
                let mode = env.new_string(mode.as_provider_mode())?;
                let pfd = env
                    .call_method(
                        resolver,
                        "openFileDescriptor",
                        "(Landroid/net/Uri;Ljava/lang/String;)Landroid/os/ParcelFileDescriptor;",
                        &[JValue::Object(&uri), JValue::Object(&mode)],
                    )?
                    .l()?;
                if pfd.is_null() {
                    return Ok(-1);
                }
                env.call_method(&pfd, "detachFd", "()I", &[])?.i()
            })
            .map_err(|reason| StorageError::io(locator, reason))?;
        if fd < 0 {
            return Err(StorageError::io(locator, "provider returned no descriptor"));
        }
        // SAFETY: detachFd transfers ownership of a valid descriptor to us
        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }
}

fn parse_uri<'local>(
    env: &mut JNIEnv<'local>,
    locator: &ResourceLocator,
) -> jni::errors::Result<JObject<'local>> {
    let text = env.new_string(locator.to_string())?;
    env.call_static_method(
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        &[JValue::Object(&text)],
    )?
    .l()
}

fn jni_failure(what: &str, e: jni::errors::Error) -> StorageError {
    StorageError::permission(what, e)
}
