use glam::{Mat4, Vec2, Vec3};
use winit::event::MouseButton;

// Mouse sensitivities, per pixel of cursor travel
const ROTATE_SPEED: f32 = 0.005; // radians
const ZOOM_DRAG_SPEED: f32 = 0.005;
const PAN_SPEED: f32 = 0.0015; // scaled by camera distance

const SCROLL_STEP: f32 = 0.1;
const MIN_DISTANCE: f32 = 1.0;
const MAX_DISTANCE: f32 = 500.0;
const MAX_ELEVATION: f32 = 1.5;

const FOV_Y_DEGREES: f32 = 45.0;
const NEAR_PLANE: f32 = 0.1;
const FAR_PLANE: f32 = 1000.0;

/// What a mouse drag is currently doing to the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragState {
    Idle,
    Rotating,
    Translating,
    Zooming,
}

impl DragState {
    fn for_button(button: MouseButton) -> Option<Self> {
        match button {
            MouseButton::Left => Some(DragState::Rotating),
            MouseButton::Middle => Some(DragState::Translating),
            MouseButton::Right => Some(DragState::Zooming),
            _ => None,
        }
    }
}

/// Orbit parameters: the eye sits `distance` away from `focus`, at the
/// given azimuth (around +Y, 0 = looking down -Z) and elevation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub focus: Vec3,
    pub distance: f32,
    pub azimuth: f32,
    pub elevation: f32,
}

impl CameraPose {
    pub fn looking_at(eye: Vec3, focus: Vec3) -> Self {
        let offset = eye - focus;
        let distance = offset.length().max(MIN_DISTANCE);
        Self {
            focus,
            distance,
            azimuth: offset.x.atan2(offset.z),
            elevation: (offset.y / distance).clamp(-1.0, 1.0).asin(),
        }
    }

    pub fn eye(&self) -> Vec3 {
        let (sin_az, cos_az) = self.azimuth.sin_cos();
        let (sin_el, cos_el) = self.elevation.sin_cos();
        self.focus + self.distance * Vec3::new(cos_el * sin_az, sin_el, cos_el * cos_az)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye(), self.focus, Vec3::Y)
    }

    // Screen-aligned axes in world space
    fn right_up(&self) -> (Vec3, Vec3) {
        let right = Vec3::new(self.azimuth.cos(), 0.0, -self.azimuth.sin());
        let forward = (self.focus - self.eye()).normalize_or_zero();
        (right, right.cross(forward).normalize_or_zero())
    }

    fn panned(&self, delta: Vec2) -> Self {
        let (right, up) = self.right_up();
        let scale = PAN_SPEED * self.distance;
        Self {
            focus: self.focus + (-delta.x * right + delta.y * up) * scale,
            ..*self
        }
    }
}

/// Snapshot taken when a drag starts; every motion event of the drag is
/// applied to this snapshot, so a drag never accumulates drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragAnchor {
    pub cursor: Vec2,
    pub pose: CameraPose,
    pub view_projection: Mat4,
}

/// Orbit camera driven by mouse drags, the scroll wheel and a few keys.
pub struct Camera {
    pose: CameraPose,
    home: CameraPose,
    model: Mat4,
    aspect: f32,
    state: DragState,
    anchor: Option<DragAnchor>,
}

impl Camera {
    pub fn new(home: CameraPose, model: Mat4, aspect: f32) -> Self {
        Self {
            pose: home,
            home,
            model,
            aspect,
            state: DragState::Idle,
            anchor: None,
        }
    }

    /// The flock lives in a unit-ish cube; it is drawn scaled by 5 and
    /// lifted so it floats above the ground grid, viewed from the side.
    pub fn for_flock(aspect: f32) -> Self {
        let home = CameraPose::looking_at(Vec3::new(0.0, 12.0, 30.0), Vec3::new(0.0, 12.0, 0.0));
        let model = Mat4::from_scale(Vec3::splat(5.0)) * Mat4::from_translation(Vec3::new(0.0, 2.0, 0.0));
        Self::new(home, model, aspect)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(FOV_Y_DEGREES.to_radians(), self.aspect, NEAR_PLANE, FAR_PLANE)
    }

    /// Projection * view, for geometry already in world space.
    pub fn world_view_projection(&self) -> Mat4 {
        self.projection() * self.pose.view_matrix()
    }

    /// Projection * view * model, for particles in simulation space.
    pub fn view_projection(&self) -> Mat4 {
        self.world_view_projection() * self.model
    }

    pub fn pose(&self) -> &CameraPose {
        &self.pose
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn anchor(&self) -> Option<&DragAnchor> {
        self.anchor.as_ref()
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Starts a drag from Idle. Returns whether the state changed.
    pub fn handle_mouse_press(&mut self, button: MouseButton, cursor: [f32; 2]) -> bool {
        if self.state != DragState::Idle {
            return false;
        }
        let Some(state) = DragState::for_button(button) else {
            return false;
        };
        self.state = state;
        self.anchor = Some(DragAnchor {
            cursor: Vec2::from(cursor),
            pose: self.pose,
            view_projection: self.view_projection(),
        });
        true
    }

    pub fn handle_mouse_release(&mut self) -> bool {
        let was_dragging = self.state != DragState::Idle;
        self.state = DragState::Idle;
        self.anchor = None;
        was_dragging
    }

    /// Recomputes the pose from the drag anchor. Returns whether it moved.
    pub fn handle_mouse_move(&mut self, cursor: [f32; 2]) -> bool {
        let Some(anchor) = self.anchor else {
            return false;
        };
        let delta = Vec2::from(cursor) - anchor.cursor;
        let from = anchor.pose;

        match self.state {
            DragState::Idle => return false,
            DragState::Rotating => {
                self.pose.azimuth = from.azimuth - delta.x * ROTATE_SPEED;
                self.pose.elevation =
                    (from.elevation + delta.y * ROTATE_SPEED).clamp(-MAX_ELEVATION, MAX_ELEVATION);
            }
            DragState::Translating => {
                self.pose.focus = from.panned(delta).focus;
            }
            DragState::Zooming => {
                self.pose.distance =
                    (from.distance * (delta.y * ZOOM_DRAG_SPEED).exp()).clamp(MIN_DISTANCE, MAX_DISTANCE);
            }
        }
        true
    }

    /// Scroll zoom, applied in any drag state. Positive `delta` moves closer.
    /// The scale is folded into an active drag anchor too, so the next drag
    /// motion keeps it.
    pub fn handle_mouse_wheel(&mut self, delta: f32) {
        let factor = (-delta * SCROLL_STEP).exp();
        self.pose.distance = (self.pose.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        if let Some(anchor) = self.anchor.as_mut() {
            anchor.pose.distance = (anchor.pose.distance * factor).clamp(MIN_DISTANCE, MAX_DISTANCE);
        }
    }

    /// Keyboard pan, `delta` in screen pixels. An active drag anchor moves
    /// with the focus.
    pub fn pan(&mut self, delta_x: f32, delta_y: f32) {
        let panned = self.pose.panned(Vec2::new(delta_x, delta_y));
        let offset = panned.focus - self.pose.focus;
        self.pose = panned;
        if let Some(anchor) = self.anchor.as_mut() {
            anchor.pose.focus += offset;
        }
    }

    pub fn set_focus(&mut self, focus: Vec3) {
        self.pose.focus = focus;
    }

    pub fn reset(&mut self) {
        self.pose = self.home;
        self.state = DragState::Idle;
        self.anchor = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::for_flock(4.0 / 3.0)
    }

    fn close(a: Mat4, b: Mat4) -> bool {
        a.abs_diff_eq(b, 1e-5)
    }

    #[test]
    fn home_pose_matches_eye_and_focus() {
        let cam = camera();
        assert!((cam.pose().eye() - Vec3::new(0.0, 12.0, 30.0)).length() < 1e-4);
        assert_eq!(cam.pose().distance, 30.0);
        assert_eq!(cam.state(), DragState::Idle);
    }

    #[test]
    fn buttons_select_drag_modes() {
        for (button, state) in [
            (MouseButton::Left, DragState::Rotating),
            (MouseButton::Middle, DragState::Translating),
            (MouseButton::Right, DragState::Zooming),
        ] {
            let mut cam = camera();
            assert!(cam.handle_mouse_press(button, [10.0, 10.0]));
            assert_eq!(cam.state(), state);
            assert!(cam.handle_mouse_release());
            assert_eq!(cam.state(), DragState::Idle);
        }
    }

    #[test]
    fn motion_without_drag_is_ignored() {
        let mut cam = camera();
        let before = *cam.pose();
        assert!(!cam.handle_mouse_move([400.0, 300.0]));
        assert_eq!(*cam.pose(), before);
    }

    #[test]
    fn second_press_while_dragging_keeps_first_mode() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [0.0, 0.0]);
        assert!(!cam.handle_mouse_press(MouseButton::Right, [5.0, 5.0]));
        assert_eq!(cam.state(), DragState::Rotating);
        assert_eq!(cam.anchor().unwrap().cursor, Vec2::ZERO);
    }

    #[test]
    fn drag_is_relative_to_anchor_not_incremental() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [100.0, 100.0]);
        cam.handle_mouse_move([150.0, 120.0]);
        let once = *cam.pose();
        cam.handle_mouse_move([150.0, 120.0]);
        assert_eq!(*cam.pose(), once);

        cam.handle_mouse_move([100.0, 100.0]);
        assert_eq!(*cam.pose(), cam.anchor().unwrap().pose);
    }

    #[test]
    fn rotate_again_reanchors_at_second_press() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [100.0, 100.0]);
        let first_anchor = *cam.anchor().unwrap();
        cam.handle_mouse_move([180.0, 140.0]);
        cam.handle_mouse_release();
        assert!(cam.anchor().is_none());

        let after_first_drag = *cam.pose();
        let matrix_at_second_press = cam.view_projection();
        cam.handle_mouse_press(MouseButton::Left, [300.0, 300.0]);
        let second_anchor = *cam.anchor().unwrap();

        assert_eq!(second_anchor.cursor, Vec2::new(300.0, 300.0));
        assert_eq!(second_anchor.pose, after_first_drag);
        assert!(close(second_anchor.view_projection, matrix_at_second_press));
        assert!(!close(second_anchor.view_projection, first_anchor.view_projection));

        // no movement yet relative to the new anchor, so no jump
        cam.handle_mouse_move([300.0, 300.0]);
        assert_eq!(*cam.pose(), after_first_drag);
    }

    #[test]
    fn translate_moves_focus_only() {
        let mut cam = camera();
        let before = *cam.pose();
        cam.handle_mouse_press(MouseButton::Middle, [0.0, 0.0]);
        cam.handle_mouse_move([40.0, 0.0]);
        let after = *cam.pose();
        assert!(after.focus.x < before.focus.x, "dragging right moves the view left");
        assert_eq!(after.distance, before.distance);
        assert_eq!(after.azimuth, before.azimuth);
    }

    #[test]
    fn zoom_drag_changes_distance() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Right, [0.0, 0.0]);
        cam.handle_mouse_move([0.0, 100.0]);
        assert!(cam.pose().distance > 30.0);
        cam.handle_mouse_move([0.0, -100.0]);
        assert!(cam.pose().distance < 30.0);
    }

    #[test]
    fn elevation_is_clamped() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [0.0, 0.0]);
        cam.handle_mouse_move([0.0, 100_000.0]);
        assert!(cam.pose().elevation <= MAX_ELEVATION);
        assert!(cam.view_projection().is_finite());
    }

    #[test]
    fn scroll_zooms_during_drag() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [0.0, 0.0]);
        cam.handle_mouse_wheel(1.0);
        assert!(cam.pose().distance < 30.0);
        assert_eq!(cam.state(), DragState::Rotating);

        cam.handle_mouse_wheel(-1000.0);
        assert_eq!(cam.pose().distance, MAX_DISTANCE);
    }

    #[test]
    fn scroll_during_zoom_drag_survives_next_motion() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Right, [0.0, 0.0]);
        cam.handle_mouse_move([0.0, 10.0]);
        let dragged = cam.pose().distance;

        cam.handle_mouse_wheel(5.0);
        let scrolled = cam.pose().distance;
        assert!(scrolled < dragged);

        cam.handle_mouse_move([0.0, 10.0]);
        assert!((cam.pose().distance - scrolled).abs() < 1e-4);
    }

    #[test]
    fn keyboard_pan_during_translate_drag_survives_next_motion() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Middle, [0.0, 0.0]);
        cam.handle_mouse_move([40.0, 0.0]);

        cam.pan(0.0, 20.0);
        let panned = cam.pose().focus;

        cam.handle_mouse_move([40.0, 0.0]);
        assert!((cam.pose().focus - panned).length() < 1e-4);
    }

    #[test]
    fn resize_changes_projection_aspect() {
        let mut cam = camera();
        let before = cam.projection();
        cam.resize(1920, 1080);
        assert!((cam.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
        assert!(!close(before, cam.projection()));

        cam.resize(0, 1080);
        assert!((cam.aspect() - 1920.0 / 1080.0).abs() < 1e-6);
    }

    #[test]
    fn reset_returns_home_and_idles() {
        let mut cam = camera();
        cam.handle_mouse_press(MouseButton::Left, [0.0, 0.0]);
        cam.handle_mouse_move([50.0, 50.0]);
        cam.pan(10.0, 0.0);
        cam.reset();
        assert_eq!(cam.state(), DragState::Idle);
        assert!((cam.pose().eye() - Vec3::new(0.0, 12.0, 30.0)).length() < 1e-4);
    }

    #[test]
    fn flock_center_projects_near_screen_center() {
        let cam = camera();
        // simulation origin -> world (0, 10, 0), just below the focus point
        let clip = cam.view_projection() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y < 0.0 && ndc.y > -0.5);
    }
}
