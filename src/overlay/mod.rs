//! Transcript overlay lifecycle.
//!
//! The overlay is a single floating panel owned by an external renderer
//! ([`OverlaySurface`]). [`OverlayController`] decides when it is visible:
//!
//! ```text
//! show()                    ──▶ cancel pending dismiss, order front, fade in
//! schedule_auto_dismiss(t)  ──▶ one-shot timer after dismiss_delay(words(t))
//!        timer fires        ──▶ hide()
//! hide()                    ──▶ fade out ──▶ order out, unless show() ran
//!                                            while the fade was in flight
//! content_changed()         ──▶ recompute the frame
//! ```
//!
//! Every show or new schedule bumps a generation counter and aborts the
//! previous timer, so a superseded dismiss never fires.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::OverlayConfig;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Rectangle in screen coordinates, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Gap between the top of the visible screen area and the panel.
const TOP_MARGIN: f64 = 4.0;

/// Frame for a panel of `content` size: centred horizontally, just below the
/// top of `screen`. `None` for empty content.
pub fn panel_frame(content: Size, screen: Rect) -> Option<Rect> {
    if content.width <= 0.0 || content.height <= 0.0 {
        return None;
    }
    Some(Rect {
        x: screen.x + (screen.width - content.width) / 2.0,
        y: screen.y + TOP_MARGIN,
        width: content.width,
        height: content.height,
    })
}

// ---------------------------------------------------------------------------
// Dismiss delay
// ---------------------------------------------------------------------------

/// Words in a transcript, at least one.
pub fn word_count(transcript: &str) -> usize {
    transcript.split_whitespace().count().max(1)
}

/// `clamp(min, words * per_word, max)`.
pub fn dismiss_delay(word_count: usize, config: &OverlayConfig) -> Duration {
    let max = config.max_dismiss_ms.max(config.min_dismiss_ms);
    let ms = (word_count as u64)
        .saturating_mul(config.per_word_ms)
        .clamp(config.min_dismiss_ms, max);
    Duration::from_millis(ms)
}

// ---------------------------------------------------------------------------
// OverlaySurface
// ---------------------------------------------------------------------------

/// The renderer-side panel. Calls are fire-and-forget.
pub trait OverlaySurface: Send + Sync {
    fn order_front(&self);
    /// Start animating the panel's alpha to `alpha` over `duration`.
    fn animate_alpha(&self, alpha: f32, duration: Duration);
    fn order_out(&self);
    fn set_frame(&self, frame: Rect);
    fn content_size(&self) -> Size;
    /// Visible area of the screen that hosts the panel.
    fn screen(&self) -> Option<Rect>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn OverlaySurface>) {}
};

/// Surface that only logs; used when no renderer is attached.
#[derive(Debug, Default)]
pub struct LogSurface;

impl OverlaySurface for LogSurface {
    fn order_front(&self) {
        log::debug!("overlay: order front");
    }

    fn animate_alpha(&self, alpha: f32, duration: Duration) {
        log::debug!("overlay: alpha -> {alpha} over {duration:?}");
    }

    fn order_out(&self) {
        log::debug!("overlay: order out");
    }

    fn set_frame(&self, frame: Rect) {
        log::trace!("overlay: frame {frame:?}");
    }

    fn content_size(&self) -> Size {
        Size::default()
    }

    fn screen(&self) -> Option<Rect> {
        None
    }
}

// ---------------------------------------------------------------------------
// OverlayController
// ---------------------------------------------------------------------------

#[derive(Default)]
struct OverlayState {
    should_be_visible: bool,
    on_screen: bool,
    generation: u64,
    dismiss: Option<JoinHandle<()>>,
}

struct Inner {
    surface: Arc<dyn OverlaySurface>,
    config: OverlayConfig,
    state: Mutex<OverlayState>,
}

/// Cheap-to-clone handle. Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct OverlayController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for OverlayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayController").finish_non_exhaustive()
    }
}

impl OverlayController {
    pub fn new(surface: Arc<dyn OverlaySurface>, config: OverlayConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                surface,
                config,
                state: Mutex::new(OverlayState::default()),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, OverlayState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_visible(&self) -> bool {
        self.state().should_be_visible
    }

    /// Cancel any pending dismiss and fade the panel in.
    pub fn show(&self) {
        if !self.inner.config.enabled {
            return;
        }
        let mut st = self.state();
        st.generation += 1;
        if let Some(timer) = st.dismiss.take() {
            timer.abort();
        }
        st.should_be_visible = true;

        let surface = &self.inner.surface;
        if !st.on_screen {
            self.reposition();
            surface.order_front();
            st.on_screen = true;
        }
        surface.animate_alpha(1.0, Duration::from_millis(self.inner.config.fade_in_ms));
    }

    /// Fade the panel out and remove it once the fade has finished.
    pub fn hide(&self) {
        let mut st = self.state();
        st.generation += 1;
        if let Some(timer) = st.dismiss.take() {
            timer.abort();
        }
        self.begin_fade_out(st);
    }

    fn begin_fade_out(&self, mut st: MutexGuard<'_, OverlayState>) {
        if !st.on_screen {
            st.should_be_visible = false;
            return;
        }
        st.should_be_visible = false;
        let generation = st.generation;
        drop(st);

        let fade = Duration::from_millis(self.inner.config.fade_out_ms);
        self.inner.surface.animate_alpha(0.0, fade);

        let this = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(fade).await;
            let mut st = this.state();
            // Any show() or hide() since this fade began owns the panel now.
            if st.generation == generation && st.on_screen {
                this.inner.surface.order_out();
                st.on_screen = false;
            }
        });
    }

    /// Schedule a one-shot hide sized to the transcript's word count,
    /// replacing any earlier schedule.
    pub fn schedule_auto_dismiss(&self, transcript: &str) {
        if !self.inner.config.enabled {
            return;
        }
        let delay = dismiss_delay(word_count(transcript), &self.inner.config);
        log::debug!("overlay: auto-dismiss in {delay:?}");

        let mut st = self.state();
        st.generation += 1;
        let generation = st.generation;
        if let Some(timer) = st.dismiss.take() {
            timer.abort();
        }

        let this = self.clone();
        st.dismiss = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut st = this.state();
            if st.generation != generation {
                return;
            }
            st.dismiss = None;
            this.begin_fade_out(st);
        }));
    }

    /// The panel's content size changed; recompute its frame.
    pub fn content_changed(&self) {
        if self.state().on_screen {
            self.reposition();
        }
    }

    fn reposition(&self) {
        let surface = &self.inner.surface;
        if let Some(frame) = surface
            .screen()
            .and_then(|screen| panel_frame(surface.content_size(), screen))
        {
            surface.set_frame(frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::mock::{RecordingSurface, SurfaceCall};
    use super::*;

    fn config() -> OverlayConfig {
        OverlayConfig::default()
    }

    fn controller() -> (OverlayController, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let ctl = OverlayController::new(surface.clone(), config());
        (ctl, surface)
    }

    async fn settle() {
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn dismiss_delay_is_clamped() {
        let cfg = config();
        assert_eq!(dismiss_delay(3, &cfg), Duration::from_millis(1500));
        assert_eq!(dismiss_delay(10, &cfg), Duration::from_millis(4000));
        assert_eq!(dismiss_delay(20, &cfg), Duration::from_millis(5000));
    }

    #[test]
    fn word_count_is_at_least_one() {
        assert_eq!(word_count(""), 1);
        assert_eq!(word_count("  one   two three "), 3);
    }

    #[test]
    fn panel_is_centred_below_top_edge() {
        let screen = Rect {
            x: 0.0,
            y: 25.0,
            width: 1440.0,
            height: 875.0,
        };
        let frame = panel_frame(
            Size {
                width: 400.0,
                height: 60.0,
            },
            screen,
        )
        .unwrap();
        assert_eq!(frame.x, 520.0);
        assert_eq!(frame.y, 29.0);
        assert_eq!(panel_frame(Size::default(), screen), None);
    }

    #[tokio::test(start_paused = true)]
    async fn auto_dismiss_hides_after_delay_and_fade() {
        let (ctl, surface) = controller();
        ctl.show();
        assert!(ctl.is_visible());
        assert_eq!(surface.calls(), vec![SurfaceCall::OrderFront, SurfaceCall::Alpha(1.0)]);

        ctl.schedule_auto_dismiss("three word transcript");

        tokio::time::sleep(Duration::from_millis(1400)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 1);
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 0);

        tokio::time::sleep(Duration::from_millis(400)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 1);
        assert!(!ctl.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn new_schedule_supersedes_old_one() {
        let (ctl, surface) = controller();
        ctl.show();
        // 20 words: 5 s.
        ctl.schedule_auto_dismiss(&"word ".repeat(20));

        tokio::time::sleep(Duration::from_millis(1000)).await;
        // 3 words: 1.5 s from now.
        ctl.schedule_auto_dismiss("a b c");

        tokio::time::sleep(Duration::from_millis(1400)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 0);

        tokio::time::sleep(Duration::from_millis(500)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 1);

        // The original 5 s timer must never fire a second hide.
        tokio::time::sleep(Duration::from_millis(5000)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 1);
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn show_cancels_pending_dismiss() {
        let (ctl, surface) = controller();
        ctl.show();
        ctl.schedule_auto_dismiss("short");
        tokio::time::sleep(Duration::from_millis(1000)).await;

        ctl.show();
        tokio::time::sleep(Duration::from_millis(6000)).await;
        settle().await;

        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 0);
        assert!(ctl.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_fade_does_not_cut_later_fade_short() {
        let (ctl, surface) = controller();
        ctl.show();
        ctl.hide();

        tokio::time::sleep(Duration::from_millis(200)).await;
        ctl.show();
        ctl.hide();

        // The first fade would have ended at 300 ms; the second runs to 500.
        tokio::time::sleep(Duration::from_millis(150)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 1);
        assert!(!ctl.is_visible());
    }

    #[tokio::test(start_paused = true)]
    async fn show_during_fade_out_keeps_panel_on_screen() {
        let (ctl, surface) = controller();
        ctl.show();
        ctl.hide();
        assert_eq!(surface.count(&SurfaceCall::Alpha(0.0)), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        ctl.show();

        tokio::time::sleep(Duration::from_millis(1000)).await;
        settle().await;
        assert_eq!(surface.count(&SurfaceCall::OrderOut), 0);
        // Already on screen: no second order-front, just a fade back in.
        assert_eq!(surface.count(&SurfaceCall::OrderFront), 1);
        assert_eq!(surface.count(&SurfaceCall::Alpha(1.0)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn content_change_repositions_visible_panel() {
        let (ctl, surface) = controller();
        ctl.content_changed();
        assert!(surface.calls().is_empty());

        *surface.content.lock().unwrap() = Size {
            width: 200.0,
            height: 40.0,
        };
        ctl.show();
        ctl.content_changed();

        let frames: Vec<_> = surface
            .calls()
            .into_iter()
            .filter(|c| matches!(c, SurfaceCall::Frame(_)))
            .collect();
        assert_eq!(frames.len(), 2);
    }

    #[tokio::test]
    async fn disabled_overlay_does_nothing() {
        let surface = Arc::new(RecordingSurface::default());
        let ctl = OverlayController::new(
            surface.clone(),
            OverlayConfig {
                enabled: false,
                ..OverlayConfig::default()
            },
        );
        ctl.show();
        ctl.schedule_auto_dismiss("hello");
        assert!(surface.calls().is_empty());
    }
}
