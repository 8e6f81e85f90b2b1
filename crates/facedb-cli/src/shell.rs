//! Interactive register / recognize session over a live frame source.
//!
//! Every command refreshes the cached frame first, so register and recognize
//! always act on the most recent capture. A failed grab keeps the previous
//! frame.

use crate::notice::Notice;
use facedb_core::service::validate_label;
use facedb_core::{EmbeddingProvider, EncodingStore, FaceService, Matcher, LABEL_PLACEHOLDER};
use facedb_hw::{Frame, FrameSource};
use std::io::{self, BufRead, Write};

const HELP: &str = "\
commands:
  name <text>       set the label used for registration
  register [name]   enroll the face in the current frame
  recognize         identify the face in the current frame
  help              show this help
  exit | quit       leave the shell";

/// Most recent frame delivered by a [`FrameSource`].
#[derive(Default)]
pub struct FrameCache {
    frame: Option<Frame>,
}

impl FrameCache {
    /// Grab a new frame. On failure the previous frame (if any) stays current.
    pub fn refresh<F: FrameSource>(&mut self, source: &mut F) -> Option<&Frame> {
        match source.grab() {
            Ok(frame) => self.frame = Some(frame),
            Err(e) => tracing::warn!(error = %e, source = %source.describe(), "frame grab failed"),
        }
        self.frame.as_ref()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Name(String),
    Register(Option<String>),
    Recognize,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        match word {
            "" => Command::Empty,
            "name" => Command::Name(rest.to_string()),
            "register" if rest.is_empty() => Command::Register(None),
            "register" => Command::Register(Some(rest.to_string())),
            "recognize" => Command::Recognize,
            "help" | "?" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => Command::Unknown(other.to_string()),
        }
    }
}

pub struct Shell<F, P, S, M> {
    source: F,
    service: FaceService<P, S, M>,
    frames: FrameCache,
    label: String,
}

impl<F, P, S, M> Shell<F, P, S, M>
where
    F: FrameSource,
    P: EmbeddingProvider,
    S: EncodingStore,
    M: Matcher,
{
    pub fn new(source: F, service: FaceService<P, S, M>) -> Self {
        Self {
            source,
            service,
            frames: FrameCache::default(),
            label: LABEL_PLACEHOLDER.to_string(),
        }
    }

    /// Current contents of the label field.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read commands from `input` until `exit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        writeln!(out, "facedb shell on {}. Type 'help' for commands.", self.source.describe())?;

        let mut lines = input.lines();
        loop {
            write!(out, "[{}] > ", self.label)?;
            out.flush()?;

            let Some(line) = lines.next() else {
                writeln!(out)?;
                break;
            };
            match Command::parse(&line?) {
                Command::Exit => break,
                Command::Empty => {}
                Command::Help => writeln!(out, "{HELP}")?,
                Command::Unknown(word) => {
                    writeln!(out, "unknown command '{word}', type 'help' for a list")?
                }
                Command::Name(text) => self.label = text,
                Command::Register(name) => {
                    if let Some(name) = name {
                        self.label = name;
                    }
                    writeln!(out, "{}", self.register())?;
                }
                Command::Recognize => writeln!(out, "{}", self.recognize())?,
            }
        }
        Ok(())
    }

    /// The label is checked before any frame is grabbed.
    pub fn register(&mut self) -> Notice {
        if let Err(e) = validate_label(&self.label) {
            return Notice::failed(&e);
        }
        let Some(frame) = self.frames.refresh(&mut self.source) else {
            return Notice::no_frame();
        };
        Notice::for_register(&self.service.register(&self.label, &frame.image))
    }

    pub fn recognize(&mut self) -> Notice {
        let Some(frame) = self.frames.refresh(&mut self.source) else {
            return Notice::no_frame();
        };
        Notice::for_recognize(&self.service.recognize(&frame.image))
    }

    /// End the session, handing back the service so the store can be closed.
    pub fn into_service(self) -> FaceService<P, S, M> {
        self.service
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::Level;
    use facedb_core::matcher::FirstWithinTolerance;
    use facedb_core::{BoundingBox, Embedding};
    use facedb_hw::StillImage;
    use facedb_store::SqliteStore;
    use image::{Rgb, RgbImage};
    use std::collections::VecDeque;
    use std::convert::Infallible;

    /// Treats the top-left pixel as the "face": black means no face, any other
    /// colour embeds as its normalised RGB triple.
    struct PixelProvider;

    impl EmbeddingProvider for PixelProvider {
        type Error = Infallible;

        fn detect(&mut self, frame: &RgbImage) -> Result<Vec<BoundingBox>, Infallible> {
            if frame.get_pixel(0, 0).0 == [0, 0, 0] {
                return Ok(Vec::new());
            }
            Ok(vec![BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                confidence: 0.99,
                landmarks: None,
            }])
        }

        fn embed(&mut self, frame: &RgbImage, _face: &BoundingBox) -> Result<Embedding, Infallible> {
            let [r, g, b] = frame.get_pixel(0, 0).0;
            Ok(Embedding::new(vec![r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]))
        }
    }

    /// Replays a scripted sequence of frames; `None` entries fail the grab.
    struct ScriptedSource {
        script: VecDeque<Option<RgbImage>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Option<RgbImage>>) -> Self {
            Self {
                script: script.into(),
            }
        }
    }

    impl FrameSource for ScriptedSource {
        type Error = io::Error;

        fn grab(&mut self) -> Result<Frame, io::Error> {
            match self.script.pop_front().flatten() {
                Some(image) => Ok(Frame::new(image, 0)),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "no frame")),
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    type TestShell<F> = Shell<F, PixelProvider, SqliteStore, FirstWithinTolerance>;

    fn solid(rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb(rgb))
    }

    fn shell_on<F: FrameSource>(source: F) -> TestShell<F> {
        Shell::new(
            source,
            FaceService::new(PixelProvider, SqliteStore::open_in_memory().unwrap()),
        )
    }

    fn run_script<F: FrameSource>(shell: &mut TestShell<F>, script: &str) -> String {
        let mut out = Vec::new();
        shell.run(script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  name   Alice Smith "), Command::Name("Alice Smith".into()));
        assert_eq!(Command::parse("register"), Command::Register(None));
        assert_eq!(Command::parse("register Bob"), Command::Register(Some("Bob".into())));
        assert_eq!(Command::parse("recognize"), Command::Recognize);
        assert_eq!(Command::parse("quit"), Command::Exit);
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("enroll x"), Command::Unknown("enroll".into()));
    }

    #[test]
    fn test_label_starts_as_placeholder_and_is_rejected() {
        let mut shell = shell_on(StillImage::from_image(solid([200, 10, 10])));
        assert_eq!(shell.label(), LABEL_PLACEHOLDER);

        let notice = shell.register();
        assert_eq!(notice.message, "Please enter a valid name.");
        assert_eq!(shell.into_service().store().count().unwrap(), 0);
    }

    #[test]
    fn test_register_then_recognize_session() {
        let mut shell = shell_on(StillImage::from_image(solid([200, 10, 10])));
        let output = run_script(&mut shell, "name Alice\nregister\nrecognize\nexit\n");

        assert!(output.contains("Face registered for Alice."), "{output}");
        assert!(output.contains("Hello, Alice!"), "{output}");
        assert_eq!(shell.label(), "Alice");
    }

    #[test]
    fn test_recognize_unknown_face_warns() {
        let mut shell = shell_on(ScriptedSource::new(vec![
            Some(solid([200, 10, 10])),
            Some(solid([10, 10, 200])),
        ]));
        shell.label = "Alice".to_string();
        assert_eq!(shell.register().level, Level::Info);

        let notice = shell.recognize();
        assert_eq!(notice.level, Level::Warning);
        assert_eq!(notice.message, "No match found.");
    }

    #[test]
    fn test_no_face_in_frame() {
        let mut shell = shell_on(StillImage::from_image(solid([0, 0, 0])));
        let notice = shell.recognize();
        assert!(notice.is_error());
        assert_eq!(notice.message, "No face detected. Try again.");
    }

    #[test]
    fn test_failed_grab_keeps_previous_frame() {
        let mut shell = shell_on(ScriptedSource::new(vec![Some(solid([200, 10, 10])), None]));
        shell.label = "Alice".to_string();
        shell.register();

        // Second grab fails; recognize runs on the cached first frame.
        let notice = shell.recognize();
        assert_eq!(notice.message, "Hello, Alice!");
        assert!(shell.frames.current().is_some());
    }

    #[test]
    fn test_invalid_label_reported_before_missing_frame() {
        let mut shell = shell_on(ScriptedSource::new(vec![None, None]));
        assert_eq!(shell.register().message, "Please enter a valid name.");
        assert!(shell.frames.current().is_none());

        shell.label = "Alice".to_string();
        assert_eq!(shell.register(), Notice::no_frame());
    }

    #[test]
    fn test_no_frame_ever_captured() {
        let mut shell = shell_on(ScriptedSource::new(vec![None]));
        assert_eq!(shell.recognize(), Notice::no_frame());
    }

    #[test]
    fn test_end_of_input_exits() {
        let mut shell = shell_on(StillImage::from_image(solid([1, 2, 3])));
        let output = run_script(&mut shell, "help\nbogus\n");
        assert!(output.contains("register [name]"));
        assert!(output.contains("unknown command 'bogus'"));
    }
}
