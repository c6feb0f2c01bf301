//! Record anonymizer
//!
//! Replays a source log and writes a copy in which every free-text field is
//! replaced with pseudorandom text and every person identifier with a salted
//! hash. Kinds, entity keys, counts, timestamps and flags are left alone, so
//! the copy indexes to the same identities as the source.

use std::fs::File as FsFile;
use std::io::{BufWriter, Read, Seek, Write};
use std::path::Path;

use convlog_core::{Attachment, Event, File, Message, Reaction};
use convlog_storage::{NIL_LINE, Player, encode_line};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::ObfuscateConfig;
use crate::error::{ObfuscateError, ObfuscateResult};

/// URLs under this prefix keep it, so links still look like file links
pub const FILE_URL_PREFIX: &str = "https://files.slack.com/";

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 ";
const HEX: &[u8] = b"0123456789abcdef";
const SALT_LEN: usize = 32;
const MAX_PADDING: usize = 40;

/// Counts of what a run rewrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObfuscateStats {
    /// Records written, nil records included
    pub records: usize,
    /// Messages rewritten, thread and file parents included
    pub messages: usize,
    /// File entries rewritten, including files nested in messages
    pub files: usize,
}

/// Rewrites records in place. One instance owns the generator for one run.
pub struct Obfuscator {
    rng: ChaCha8Rng,
    salt: String,
    stats: ObfuscateStats,
}

impl Obfuscator {
    pub fn new(config: &ObfuscateConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let salt = match &config.salt {
            Some(salt) => salt.clone(),
            None => random_exact(&mut rng, SALT_LEN),
        };
        Self {
            rng,
            salt,
            stats: ObfuscateStats::default(),
        }
    }

    /// What has been rewritten so far
    pub fn stats(&self) -> ObfuscateStats {
        self.stats
    }

    /// Anonymize one record
    pub fn event(&mut self, ev: &mut Event) {
        if let Some(parent) = ev.parent.as_mut() {
            self.message(parent);
        }
        for m in &mut ev.messages {
            self.message(m);
        }
        for f in &mut ev.files {
            self.file(f);
        }
        self.stats.records += 1;
    }

    /// Hash a person or workspace identifier.
    ///
    /// The first character is kept as the type prefix and the length is
    /// preserved (up to the digest length). A bare prefix gets one hash
    /// character so it never comes out unchanged. Empty stays empty.
    pub fn id(&self, id: &str) -> String {
        let mut chars = id.chars();
        let Some(prefix) = chars.next() else {
            return String::new();
        };
        let rest = chars.count().max(1);
        let digest = blake3::hash(format!("{}{}", self.salt, id).as_bytes());
        let hex = digest.to_hex().to_ascii_uppercase();
        let mut out = String::with_capacity(rest + 1);
        out.push(prefix);
        out.push_str(&hex[..rest.min(hex.len())]);
        out
    }

    fn message(&mut self, m: &mut Message) {
        if !m.client_msg_id.is_empty() {
            m.client_msg_id = random_uuid(&mut self.rng);
        }
        m.user = self.id(&m.user);
        m.team = self.id(&m.team);
        m.text = self.text(&m.text);
        if let Some(edited) = m.edited.as_mut() {
            edited.user = self.id(&edited.user);
        }
        for r in &mut m.reactions {
            self.reaction(r);
        }
        for a in &mut m.attachments {
            self.attachment(a);
        }
        for f in &mut m.files {
            self.file(f);
        }
        self.stats.messages += 1;
    }

    fn reaction(&mut self, r: &mut Reaction) {
        r.name = random_exact(&mut self.rng, r.name.chars().count());
        for u in &mut r.users {
            let hashed = self.id(u);
            *u = hashed;
        }
    }

    fn attachment(&mut self, a: &mut Attachment) {
        a.title = self.text(&a.title);
        a.text = self.text(&a.text);
        a.fallback = self.text(&a.fallback);
        a.title_link = self.url(&a.title_link);
        a.from_url = self.url(&a.from_url);
    }

    fn file(&mut self, f: &mut File) {
        f.name = self.text(&f.name);
        f.title = self.text(&f.title);
        f.user = self.id(&f.user);
        for url in [
            &mut f.url_private,
            &mut f.url_private_download,
            &mut f.permalink,
            &mut f.permalink_public,
            &mut f.thumb_64,
            &mut f.thumb_360,
            &mut f.thumb_720,
        ] {
            let scrubbed = self.url(url);
            *url = scrubbed;
        }
        f.thumb_360_w = 0;
        f.thumb_360_h = 0;
        f.thumb_720_w = 0;
        f.thumb_720_h = 0;
        f.original_w = 0;
        f.original_h = 0;
        self.stats.files += 1;
    }

    /// Random text at least as long as `s`
    fn text(&mut self, s: &str) -> String {
        if s.is_empty() {
            return String::new();
        }
        self.padded(s.chars().count())
    }

    /// File URLs keep their prefix. A bare prefix still gets a random path.
    fn url(&mut self, s: &str) -> String {
        match s.strip_prefix(FILE_URL_PREFIX) {
            Some(rest) => {
                let path = self.padded(rest.chars().count().max(1));
                format!("{FILE_URL_PREFIX}{path}")
            }
            None => self.text(s),
        }
    }

    fn padded(&mut self, len: usize) -> String {
        let pad = self.rng.random_range(0..MAX_PADDING);
        random_exact(&mut self.rng, len + pad)
    }
}

fn random_exact(rng: &mut ChaCha8Rng, n: usize) -> String {
    (0..n)
        .map(|_| char::from(CHARSET[rng.random_range(0..CHARSET.len())]))
        .collect()
}

fn random_uuid(rng: &mut ChaCha8Rng) -> String {
    (0..36)
        .map(|i| match i {
            8 | 13 | 18 | 23 => '-',
            _ => char::from(HEX[rng.random_range(0..HEX.len())]),
        })
        .collect()
}

/// Anonymize the log read from `src` into `dst`.
///
/// The whole source is indexed first, so a malformed source fails before
/// anything is written. Output already written when a later record fails
/// is left in place.
#[instrument(skip_all, fields(seed = config.seed))]
pub fn obfuscate<R, W>(
    src: R,
    dst: W,
    config: &ObfuscateConfig,
) -> ObfuscateResult<ObfuscateStats>
where
    R: Read + Seek,
    W: Write,
{
    let mut player = Player::new(src)?;
    let offset = player.offset_handle();
    let mut obf = Obfuscator::new(config);
    let mut out = BufWriter::new(dst);
    let mut nil = 0usize;

    player.for_each(|ev| -> ObfuscateResult<()> {
        let line = match ev {
            Some(ev) => {
                let mut ev = ev.clone();
                obf.event(&mut ev);
                encode_line(&ev).map_err(|e| ObfuscateError::Encode {
                    offset: offset.get(),
                    message: e.to_string(),
                })?
            }
            None => {
                nil += 1;
                NIL_LINE.to_vec()
            }
        };
        out.write_all(&line).map_err(|source| ObfuscateError::Write {
            offset: offset.get(),
            source,
        })
    })?;
    out.flush().map_err(|source| ObfuscateError::Write {
        offset: offset.get(),
        source,
    })?;

    let mut stats = obf.stats();
    stats.records += nil;
    debug!(nil, "Copied nil records");
    info!(
        records = stats.records,
        messages = stats.messages,
        files = stats.files,
        "Obfuscated log"
    );
    Ok(stats)
}

/// Anonymize the log at `src` into a new file at `dst`
pub fn obfuscate_file(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    config: &ObfuscateConfig,
) -> ObfuscateResult<ObfuscateStats> {
    let src = src.as_ref();
    let dst = dst.as_ref();
    let input = FsFile::open(src).map_err(|source| ObfuscateError::Open {
        path: src.display().to_string(),
        source,
    })?;
    let output = FsFile::create(dst).map_err(|source| ObfuscateError::Open {
        path: dst.display().to_string(),
        source,
    })?;
    obfuscate(input, output, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use convlog_core::Edited;

    fn obfuscator() -> Obfuscator {
        Obfuscator::new(&ObfuscateConfig::new(1).with_salt("salt"))
    }

    #[test]
    fn test_id_keeps_prefix_and_length() {
        let obf = obfuscator();
        let out = obf.id("U012ABCDEF");
        assert_eq!(out.len(), 10);
        assert!(out.starts_with('U'));
        assert_ne!(out, "U012ABCDEF");
        assert_eq!(out, obf.id("U012ABCDEF"));
        assert_ne!(out, obf.id("U012ABCDEG"));
        assert_eq!(obf.id(""), "");
    }

    #[test]
    fn test_single_character_id_changes() {
        let obf = obfuscator();
        let out = obf.id("U");
        assert_eq!(out.len(), 2);
        assert!(out.starts_with('U'));
        assert_ne!(out, "U");
        assert_eq!(out, obf.id("U"));
    }

    #[test]
    fn test_bare_file_prefix_gets_random_path() {
        let mut obf = obfuscator();
        let mut file = File::new("F1", "a.png");
        file.url_private = FILE_URL_PREFIX.to_string();
        let parent = Message::new("5.0", "x").with_user("U");
        let mut ev = Event::files("C1", parent, false, vec![file]);
        obf.event(&mut ev);

        let out = &ev.files[0].url_private;
        assert!(out.starts_with(FILE_URL_PREFIX));
        assert!(out.len() > FILE_URL_PREFIX.len());
        assert_ne!(ev.parent.as_ref().unwrap().user, "U");
    }

    #[test]
    fn test_attachments_and_nested_files_scrubbed() {
        let mut obf = obfuscator();
        let link = format!("{FILE_URL_PREFIX}files-pri/T1-F9/diagram.png");
        let attachment = Attachment {
            title: "Quarterly numbers".into(),
            title_link: link.clone(),
            text: "revenue is up".into(),
            fallback: "Quarterly numbers: revenue is up".into(),
            from_url: "https://intranet.example.com/q3".into(),
        };
        let sparse = Attachment {
            title: "only a title".into(),
            ..Default::default()
        };
        let mut nested = File::new("F9", "diagram.png");
        nested.title = "Diagram".into();
        nested.user = "U777".into();
        nested.url_private = link.clone();
        nested.original_w = 640;

        let mut msg = Message::new("7.0", "look").with_files(vec![nested.clone()]);
        msg.attachments = vec![attachment.clone(), sparse];
        let mut ev = Event::messages("C1", vec![msg]);
        obf.event(&mut ev);

        let out = &ev.messages[0];
        let a = &out.attachments[0];
        assert_ne!(a.title, attachment.title);
        assert_ne!(a.text, attachment.text);
        assert_ne!(a.fallback, attachment.fallback);
        assert_ne!(a.title_link, attachment.title_link);
        assert!(a.title_link.starts_with(FILE_URL_PREFIX));
        assert_ne!(a.from_url, attachment.from_url);
        assert!(!a.from_url.starts_with("https://intranet"));

        let b = &out.attachments[1];
        assert_ne!(b.title, "only a title");
        assert!(b.title_link.is_empty());
        assert!(b.text.is_empty());
        assert!(b.fallback.is_empty());
        assert!(b.from_url.is_empty());

        let f = &out.files[0];
        assert_eq!(f.id, "F9");
        assert_ne!(f.name, nested.name);
        assert_ne!(f.title, nested.title);
        assert_eq!(f.user, obf.id("U777"));
        assert!(f.url_private.starts_with(FILE_URL_PREFIX));
        assert_ne!(f.url_private, nested.url_private);
        assert_eq!(f.original_w, 0);

        assert_eq!(obf.stats().files, 1);
        assert_eq!(obf.stats().messages, 1);
    }

    #[test]
    fn test_id_depends_on_salt() {
        let a = Obfuscator::new(&ObfuscateConfig::new(1).with_salt("a"));
        let b = Obfuscator::new(&ObfuscateConfig::new(1).with_salt("b"));
        assert_ne!(a.id("U012ABCDEF"), b.id("U012ABCDEF"));
    }

    #[test]
    fn test_text_scrubbed_and_structure_kept() {
        let mut obf = obfuscator();
        let mut msg = Message::new("1.000001", "secret plans").with_user("U123");
        msg.client_msg_id = "3a8c1f2e-0000-4000-8000-000000000000".into();
        msg.thread_ts = "1.000001".into();
        msg.reply_count = 3;
        msg.edited = Some(Edited {
            user: "U123".into(),
            ts: "2.0".into(),
        });
        msg.reactions = vec![Reaction {
            name: "thumbsup".into(),
            count: 2,
            users: vec!["U123".into(), "U456".into()],
        }];
        let mut ev = Event::messages("C1", vec![msg.clone()]);
        obf.event(&mut ev);

        let out = &ev.messages[0];
        assert_eq!(ev.channel_id, "C1");
        assert_eq!(ev.count, 1);
        assert_eq!(out.ts, msg.ts);
        assert_eq!(out.thread_ts, msg.thread_ts);
        assert_eq!(out.reply_count, 3);
        assert_ne!(out.text, msg.text);
        assert!(out.text.len() >= msg.text.len());
        assert_eq!(out.user, obf.id("U123"));
        assert_eq!(out.edited.as_ref().unwrap().user, out.user);
        assert_eq!(out.edited.as_ref().unwrap().ts, "2.0");
        assert_eq!(out.client_msg_id.len(), 36);
        assert_ne!(out.client_msg_id, msg.client_msg_id);
        assert_eq!(out.reactions[0].name.len(), "thumbsup".len());
        assert_eq!(out.reactions[0].count, 2);
        assert_eq!(out.reactions[0].users[0], out.user);
    }

    #[test]
    fn test_empty_fields_stay_empty() {
        let mut obf = obfuscator();
        let mut ev = Event::messages("C1", vec![Message::new("1.0", "")]);
        obf.event(&mut ev);
        let out = &ev.messages[0];
        assert!(out.text.is_empty());
        assert!(out.user.is_empty());
        assert!(out.client_msg_id.is_empty());
    }

    #[test]
    fn test_file_urls_and_dimensions() {
        let mut obf = obfuscator();
        let mut file = File::new("F1", "report.pdf");
        file.url_private = format!("{FILE_URL_PREFIX}files-pri/T1-F1/report.pdf");
        file.permalink = "https://example.slack.com/files/U1/F1/report.pdf".into();
        file.thumb_360_w = 360;
        file.original_h = 1080;
        let parent = Message::new("5.0", "see attached");
        let mut ev = Event::files("C1", parent, false, vec![file.clone()]);
        obf.event(&mut ev);

        let out = &ev.files[0];
        assert_eq!(out.id, "F1");
        assert_ne!(out.name, file.name);
        assert!(out.url_private.starts_with(FILE_URL_PREFIX));
        assert_ne!(out.url_private, file.url_private);
        assert_ne!(out.permalink, file.permalink);
        assert_eq!(out.thumb_360_w, 0);
        assert_eq!(out.original_h, 0);
        assert_eq!(ev.parent.as_ref().unwrap().ts, "5.0");
        assert_eq!(ev.id(), "fC1:5.0");
        assert_eq!(obf.stats().files, 1);
        assert_eq!(obf.stats().messages, 1);
    }

    #[test]
    fn test_same_seed_same_output() {
        let run = |seed| {
            let mut obf = Obfuscator::new(&ObfuscateConfig::new(seed));
            let msg = Message::new("1.0", "hello").with_user("U1");
            let mut ev = Event::messages("C1", vec![msg]);
            obf.event(&mut ev);
            ev.messages.remove(0)
        };
        assert_eq!(run(9), run(9));
        assert_ne!(run(9).text, run(10).text);
    }
}
