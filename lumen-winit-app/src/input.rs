use std::collections::HashSet;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use lumen_scene::camera::Camera;

/// 当前帧的键盘和鼠标状态
#[derive(Debug, Default)]
pub struct InputState {
    pressed: HashSet<KeyCode>,
    /// 本帧新按下的键
    just_pressed: HashSet<KeyCode>,
    right_button_down: bool,
    cursor: Option<Vec2>,
    /// 本帧累计的鼠标位移
    cursor_delta: Vec2,
}
impl InputState {
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => {
                        if self.pressed.insert(code) {
                            self.just_pressed.insert(code);
                        }
                    }
                    ElementState::Released => {
                        self.pressed.remove(&code);
                    }
                }
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Right,
                ..
            } => {
                self.right_button_down = *state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                let position = Vec2::new(position.x as f32, position.y as f32);
                if let Some(last) = self.cursor {
                    self.cursor_delta += position - last;
                }
                self.cursor = Some(position);
            }
            WindowEvent::Focused(false) => {
                self.pressed.clear();
                self.right_button_down = false;
            }
            _ => {}
        }
    }

    #[inline]
    pub fn is_pressed(&self, key: KeyCode) -> bool {
        self.pressed.contains(&key)
    }

    #[inline]
    pub fn just_pressed(&self, key: KeyCode) -> bool {
        self.just_pressed.contains(&key)
    }

    /// 每帧结束时调用
    pub fn end_frame(&mut self) {
        self.just_pressed.clear();
        self.cursor_delta = Vec2::ZERO;
    }
}

/// WASD 平移，QE 升降，按住右键拖动旋转
pub struct CameraController {
    /// 米每秒
    pub move_speed: f32,
    /// 度每像素
    pub rotate_speed: f32,
}
impl Default for CameraController {
    fn default() -> Self {
        Self {
            move_speed: 4.0,
            rotate_speed: 0.2,
        }
    }
}
impl CameraController {
    pub fn update(&self, camera: &mut Camera, input: &InputState, dt: f32) {
        let step = self.move_speed * dt * if input.is_pressed(KeyCode::ShiftLeft) { 4.0 } else { 1.0 };
        let axis = |positive: KeyCode, negative: KeyCode| {
            (input.is_pressed(positive) as i32 - input.is_pressed(negative) as i32) as f32
        };

        camera.move_forward(axis(KeyCode::KeyW, KeyCode::KeyS) * step);
        camera.move_right(axis(KeyCode::KeyD, KeyCode::KeyA) * step);
        camera.move_up(axis(KeyCode::KeyE, KeyCode::KeyQ) * step);

        if input.right_button_down {
            camera.rotate_yaw(-input.cursor_delta.x * self.rotate_speed);
            camera.rotate_pitch(-input.cursor_delta.y * self.rotate_speed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_input_keeps_camera_still() {
        let mut camera = Camera::default();
        let before = camera;
        CameraController::default().update(&mut camera, &InputState::default(), 0.016);
        assert_eq!(camera, before);
    }

    #[test]
    fn just_pressed_clears_at_end_of_frame() {
        let mut input = InputState::default();
        input.pressed.insert(KeyCode::F1);
        input.just_pressed.insert(KeyCode::F1);
        assert!(input.just_pressed(KeyCode::F1));

        input.end_frame();
        assert!(!input.just_pressed(KeyCode::F1));
        assert!(input.is_pressed(KeyCode::F1));
    }
}
